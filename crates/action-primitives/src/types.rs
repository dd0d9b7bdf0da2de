//! Core data types for action primitives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use stepreplay_core_types::RunId;
use tokio_util::sync::CancellationToken;

/// Execution context for driver calls
///
/// Carries the run the call belongs to, a deadline for timeout
/// enforcement, and a cancellation token shared by every action of a run.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Run this call belongs to
    pub run_id: RunId,

    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    /// Create a new execution context
    pub fn new(run_id: RunId, timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            run_id,
            deadline: Instant::now() + timeout,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Derive a context for one action: fresh id and deadline, same run and token
    pub fn for_action(&self, timeout: Duration) -> Self {
        Self::new(self.run_id.clone(), timeout, self.cancel_token.clone())
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Opaque handle to a live element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-specific node reference
    pub node_id: String,

    /// Stable fallback id assigned by the marking pass, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl ElementHandle {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

/// Attributes of a live element, as read by the marking pass
///
/// This is what the selector strategies synthesize descriptors from and
/// what the language model sees as page state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAttributes {
    /// Lower-case tag name; empty when unknown
    #[serde(default)]
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Visible text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// 1-based position among siblings with the same tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth_of_type: Option<usize>,

    /// Stable fallback id assigned by the marking pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_id: Option<String>,

    /// Nearest ancestor that is identifiable on its own (test id or role+name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Box<ElementAttributes>>,
}

impl ElementAttributes {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_test_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>, name: Option<&str>) -> Self {
        self.role = Some(role.into());
        self.accessible_name = name.map(str::to_string);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_nth_of_type(mut self, nth: usize) -> Self {
        self.nth_of_type = Some(nth);
        self
    }

    pub fn with_fallback_id(mut self, id: impl Into<String>) -> Self {
        self.fallback_id = Some(id.into());
        self
    }

    pub fn with_container(mut self, container: ElementAttributes) -> Self {
        self.container = Some(Box::new(container));
        self
    }

    /// True when not even the css-fallback strategy has anything to work with
    pub fn is_degenerate(&self) -> bool {
        self.tag.trim().is_empty()
            && self.test_id.is_none()
            && self.role.is_none()
            && self.label.is_none()
            && self.placeholder.is_none()
            && self.alt.is_none()
            && self.title.is_none()
            && self.text.is_none()
    }
}

/// Live page state handed to the decision model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementAttributes>,
}

impl PageState {
    pub fn element(&self, fallback_id: &str) -> Option<&ElementAttributes> {
        self.elements
            .iter()
            .find(|el| el.fallback_id.as_deref() == Some(fallback_id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modifier {
    Alt,
    Control,
    Meta,
    Shift,
}

/// Click offset relative to the element's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickPosition {
    pub x: f64,
    pub y: f64,
}

/// Options for a driver click
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub modifiers: Vec<Modifier>,
    pub position: Option<ClickPosition>,
    pub click_count: u8,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            modifiers: Vec::new(),
            position: None,
            click_count: 1,
        }
    }
}

/// How a form-update record changes a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormOperation {
    /// Replace the value
    Fill,
    /// Type key by key, appending
    Type,
    /// Pick an option by label or value
    Select,
    Check,
    Uncheck,
}

/// Property read by an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertProperty {
    Text,
    Value,
    Visible,
    Url,
    Title,
}

impl AssertProperty {
    /// Page-level properties need no target element
    pub fn is_page_level(&self) -> bool {
        matches!(self, AssertProperty::Url | AssertProperty::Title)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssertProperty::Text => "text",
            AssertProperty::Value => "value",
            AssertProperty::Visible => "visible",
            AssertProperty::Url => "url",
            AssertProperty::Title => "title",
        }
    }
}

/// Kind of an action record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Navigation,
    Click,
    FormUpdate,
    Assertion,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Navigation => "navigation",
            ActionKind::Click => "click",
            ActionKind::FormUpdate => "form-update",
            ActionKind::Assertion => "assertion",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_click_count() -> u8 {
    1
}

fn is_default_click_count(count: &u8) -> bool {
    *count == 1
}

/// Resolved intent for one action of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionRecord {
    Navigate {
        url: String,
    },

    Click {
        #[serde(default)]
        button: MouseButton,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<Modifier>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<ClickPosition>,
        #[serde(
            default = "default_click_count",
            skip_serializing_if = "is_default_click_count"
        )]
        click_count: u8,
    },

    FormUpdate {
        operation: FormOperation,
        #[serde(default)]
        value: String,
    },

    Assertion {
        property: AssertProperty,
        expected: String,
        #[serde(default)]
        exact: bool,
    },
}

impl ActionRecord {
    /// Plain left click
    pub fn click() -> Self {
        ActionRecord::Click {
            button: MouseButton::Left,
            modifiers: Vec::new(),
            position: None,
            click_count: 1,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRecord::Navigate { .. } => ActionKind::Navigation,
            ActionRecord::Click { .. } => ActionKind::Click,
            ActionRecord::FormUpdate { .. } => ActionKind::FormUpdate,
            ActionRecord::Assertion { .. } => ActionKind::Assertion,
        }
    }

    /// Whether performing this record needs a resolved element
    pub fn requires_target(&self) -> bool {
        match self {
            ActionRecord::Navigate { .. } => false,
            ActionRecord::Click { .. } | ActionRecord::FormUpdate { .. } => true,
            ActionRecord::Assertion { property, .. } => !property.is_page_level(),
        }
    }

    pub fn click_options(&self) -> Option<ClickOptions> {
        match self {
            ActionRecord::Click {
                button,
                modifiers,
                position,
                click_count,
            } => Some(ClickOptions {
                button: *button,
                modifiers: modifiers.clone(),
                position: *position,
                click_count: *click_count,
            }),
            _ => None,
        }
    }

    /// One-line description with parameters, for logs and error reports
    pub fn describe(&self) -> String {
        match self {
            ActionRecord::Navigate { url } => format!("navigate to {}", url),
            ActionRecord::Click {
                button,
                modifiers,
                click_count,
                ..
            } => {
                let mut out = format!("{:?} click", button).to_lowercase();
                if *click_count > 1 {
                    out.push_str(&format!(" x{}", click_count));
                }
                if !modifiers.is_empty() {
                    let mods: Vec<String> =
                        modifiers.iter().map(|m| format!("{:?}", m)).collect();
                    out.push_str(&format!(" with {}", mods.join("+")));
                }
                out
            }
            ActionRecord::FormUpdate { operation, value } => {
                format!("{:?} '{}'", operation, value).to_lowercase()
            }
            ActionRecord::Assertion {
                property,
                expected,
                exact,
            } => format!(
                "assert {} {} '{}'",
                property.name(),
                if *exact { "equals" } else { "contains" },
                expected
            ),
        }
    }
}

/// Report produced by one performed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Whether the action succeeded
    pub ok: bool,

    /// Description of the performed action
    pub action: String,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// URL after the action, when the action navigated
    pub url_after: Option<String>,

    /// Error details (if failed)
    pub error: Option<String>,
}

impl ActionReport {
    /// Create a successful action report
    pub fn success(action: String, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            action,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            url_after: None,
            error: None,
        }
    }

    /// Create a failed action report
    pub fn failure(
        action: String,
        started_at: DateTime<Utc>,
        latency_ms: u64,
        error: &crate::errors::ActionError,
    ) -> Self {
        Self {
            ok: false,
            action,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            url_after: None,
            error: Some(error.to_string()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_after = Some(url.into());
        self
    }
}
