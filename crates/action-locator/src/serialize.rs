//! JSON-safe selector form
//!
//! Patterns cannot be stored as live regexes, so text values are written
//! either as a plain string (literal) or as
//! `{ "isPattern": true, "pattern": "...", "flags": "i" }`.
//! Converting back recompiles every pattern and rejects invalid ones.

use action_primitives::{SelectorDescriptor, SelectorKind, TextMatch};
use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// Stored text value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedText {
    Literal(String),
    Pattern {
        #[serde(rename = "isPattern")]
        is_pattern: bool,
        pattern: String,
        #[serde(default)]
        flags: String,
    },
}

/// Strategy-specific part of a stored selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SerializedKind {
    TestId {
        attribute: String,
        id: String,
    },
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<SerializedText>,
        #[serde(default)]
        exact: bool,
    },
    Label {
        text: SerializedText,
        #[serde(default)]
        exact: bool,
    },
    Placeholder {
        text: SerializedText,
        #[serde(default)]
        exact: bool,
    },
    AltText {
        text: SerializedText,
        #[serde(default)]
        exact: bool,
    },
    Title {
        text: SerializedText,
        #[serde(default)]
        exact: bool,
    },
    Text {
        text: SerializedText,
        #[serde(default)]
        exact: bool,
    },
    Css {
        selector: String,
    },
}

/// Stored selector: kind fields inline, plus optional `nth` and `child`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedSelector {
    #[serde(flatten)]
    pub kind: SerializedKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<SerializedSelector>>,
}

fn text_to_serialized(text: &TextMatch) -> SerializedText {
    match text {
        TextMatch::Literal(value) => SerializedText::Literal(value.clone()),
        TextMatch::Pattern(pattern) => SerializedText::Pattern {
            is_pattern: true,
            pattern: pattern.source().to_string(),
            flags: pattern.flags().to_string(),
        },
    }
}

fn text_from_serialized(text: &SerializedText) -> Result<TextMatch, LocatorError> {
    match text {
        SerializedText::Literal(value) => Ok(TextMatch::literal(value.clone())),
        SerializedText::Pattern {
            is_pattern: true,
            pattern,
            flags,
        } => TextMatch::pattern(pattern.clone(), flags.clone()).map_err(|err| {
            LocatorError::InvalidSelector(format!("pattern /{}/{}: {}", pattern, flags, err))
        }),
        SerializedText::Pattern { pattern, .. } => Err(LocatorError::InvalidSelector(format!(
            "text object for '{}' is not marked as a pattern",
            pattern
        ))),
    }
}

/// Convert a runtime descriptor to its stored form
pub fn serialize_selector(descriptor: &SelectorDescriptor) -> SerializedSelector {
    let kind = match &descriptor.kind {
        SelectorKind::TestId { attribute, id } => SerializedKind::TestId {
            attribute: attribute.clone(),
            id: id.clone(),
        },
        SelectorKind::Role { role, name, exact } => SerializedKind::Role {
            role: role.clone(),
            name: name.as_ref().map(text_to_serialized),
            exact: *exact,
        },
        SelectorKind::Label { text, exact } => SerializedKind::Label {
            text: text_to_serialized(text),
            exact: *exact,
        },
        SelectorKind::Placeholder { text, exact } => SerializedKind::Placeholder {
            text: text_to_serialized(text),
            exact: *exact,
        },
        SelectorKind::AltText { text, exact } => SerializedKind::AltText {
            text: text_to_serialized(text),
            exact: *exact,
        },
        SelectorKind::Title { text, exact } => SerializedKind::Title {
            text: text_to_serialized(text),
            exact: *exact,
        },
        SelectorKind::Text { text, exact } => SerializedKind::Text {
            text: text_to_serialized(text),
            exact: *exact,
        },
        SelectorKind::Css { selector } => SerializedKind::Css {
            selector: selector.clone(),
        },
    };

    SerializedSelector {
        kind,
        nth: descriptor.nth,
        child: descriptor
            .child
            .as_deref()
            .map(|child| Box::new(serialize_selector(child))),
    }
}

/// Convert a stored selector back into a runtime descriptor
pub fn deserialize_selector(
    serialized: &SerializedSelector,
) -> Result<SelectorDescriptor, LocatorError> {
    let kind = match &serialized.kind {
        SerializedKind::TestId { attribute, id } => SelectorKind::TestId {
            attribute: attribute.clone(),
            id: id.clone(),
        },
        SerializedKind::Role { role, name, exact } => SelectorKind::Role {
            role: role.clone(),
            name: name.as_ref().map(text_from_serialized).transpose()?,
            exact: *exact,
        },
        SerializedKind::Label { text, exact } => SelectorKind::Label {
            text: text_from_serialized(text)?,
            exact: *exact,
        },
        SerializedKind::Placeholder { text, exact } => SelectorKind::Placeholder {
            text: text_from_serialized(text)?,
            exact: *exact,
        },
        SerializedKind::AltText { text, exact } => SelectorKind::AltText {
            text: text_from_serialized(text)?,
            exact: *exact,
        },
        SerializedKind::Title { text, exact } => SelectorKind::Title {
            text: text_from_serialized(text)?,
            exact: *exact,
        },
        SerializedKind::Text { text, exact } => SelectorKind::Text {
            text: text_from_serialized(text)?,
            exact: *exact,
        },
        SerializedKind::Css { selector } => SelectorKind::Css {
            selector: selector.clone(),
        },
    };

    Ok(SelectorDescriptor {
        kind,
        nth: serialized.nth,
        child: serialized
            .child
            .as_deref()
            .map(deserialize_selector)
            .transpose()?
            .map(Box::new),
    })
}
