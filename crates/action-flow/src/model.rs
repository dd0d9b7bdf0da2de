//! Decision model boundary
//!
//! The executor never reads free text from the model. Every decision
//! point has a declared output shape and the model must answer with it:
//! which kind of action a step needs, the parameters of that action
//! (targets named by fallback id), and whether the step's goal is met.

use action_primitives::{
    ActionKind, AssertProperty, ClickPosition, FormOperation, Modifier, MouseButton, PageState,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepreplay_core_types::Step;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model answer does not fit the requested shape: {0}")]
    InvalidResponse(String),

    #[error("model call timed out")]
    Timeout,
}

/// What the model knows about the run so far
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPrompt {
    pub test: String,
    pub step: Step,
    /// Earlier steps with the actions that completed them
    pub history: Vec<StepHistory>,
    /// Actions already taken for this step
    pub actions_taken: Vec<String>,
    pub page: PageState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepHistory {
    pub index: usize,
    pub text: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPlan {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickPlan {
    /// Fallback id of the element to click
    pub target: String,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub position: Option<ClickPosition>,
    #[serde(default = "one")]
    pub click_count: u8,
}

fn one() -> u8 {
    1
}

impl ClickPlan {
    pub fn on(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            button: MouseButton::Left,
            modifiers: Vec::new(),
            position: None,
            click_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormPlan {
    pub target: String,
    pub operation: FormOperation,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionPlan {
    /// Absent for page-level properties
    pub target: Option<String>,
    pub property: AssertProperty,
    pub expected: String,
    #[serde(default)]
    pub exact: bool,
}

/// Language-model collaborator
#[async_trait]
pub trait DecisionModel: Send + Sync {
    /// Which kind of action the step needs next
    async fn classify_action(&self, prompt: &StepPrompt) -> Result<ActionKind, ModelError>;

    async fn plan_navigation(&self, prompt: &StepPrompt) -> Result<NavigationPlan, ModelError>;

    /// Pick the element to click among `prompt.page.elements`
    async fn plan_click(&self, prompt: &StepPrompt) -> Result<ClickPlan, ModelError>;

    async fn plan_form_update(&self, prompt: &StepPrompt) -> Result<FormPlan, ModelError>;

    async fn plan_assertion(&self, prompt: &StepPrompt) -> Result<AssertionPlan, ModelError>;

    /// Whether the actions taken so far accomplish the step
    async fn check_intent(&self, prompt: &StepPrompt) -> Result<bool, ModelError>;
}

#[cfg(any(test, feature = "fake"))]
pub use scripted::{ScriptedAction, ScriptedModel};

#[cfg(any(test, feature = "fake"))]
mod scripted {
    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    /// One scripted answer to a classify + plan pair
    #[derive(Debug, Clone)]
    pub enum ScriptedAction {
        Navigate(NavigationPlan),
        Click(ClickPlan),
        Form(FormPlan),
        Assert(AssertionPlan),
        /// Classification fails with this error
        Fail(ModelError),
    }

    impl ScriptedAction {
        pub fn navigate(url: impl Into<String>) -> Self {
            ScriptedAction::Navigate(NavigationPlan { url: url.into() })
        }

        pub fn click(target: impl Into<String>) -> Self {
            ScriptedAction::Click(ClickPlan::on(target))
        }

        pub fn fill(target: impl Into<String>, value: impl Into<String>) -> Self {
            ScriptedAction::Form(FormPlan {
                target: target.into(),
                operation: FormOperation::Fill,
                value: value.into(),
            })
        }

        fn kind(&self) -> Result<ActionKind, ModelError> {
            match self {
                ScriptedAction::Navigate(_) => Ok(ActionKind::Navigation),
                ScriptedAction::Click(_) => Ok(ActionKind::Click),
                ScriptedAction::Form(_) => Ok(ActionKind::FormUpdate),
                ScriptedAction::Assert(_) => Ok(ActionKind::Assertion),
                ScriptedAction::Fail(err) => Err(err.clone()),
            }
        }
    }

    #[derive(Default)]
    struct Script {
        actions: VecDeque<ScriptedAction>,
        /// Repeated once `actions` runs dry
        fallback: Option<ScriptedAction>,
        intents: VecDeque<Result<bool, ModelError>>,
    }

    /// Deterministic model answering from per-step scripts.
    ///
    /// Steps are matched by text. Intent checks answer `true` unless
    /// scripted otherwise.
    #[derive(Default)]
    pub struct ScriptedModel {
        scripts: Mutex<HashMap<String, Script>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue actions for the step with this text
        pub fn on_step(self, step: &str, actions: Vec<ScriptedAction>) -> Self {
            self.scripts
                .lock()
                .entry(step.trim().to_string())
                .or_default()
                .actions
                .extend(actions);
            self
        }

        /// Answer every classification of this step with `action`
        pub fn always(self, step: &str, action: ScriptedAction) -> Self {
            self.scripts
                .lock()
                .entry(step.trim().to_string())
                .or_default()
                .fallback = Some(action);
            self
        }

        /// Queue intent-check answers for the step
        pub fn intents(self, step: &str, answers: Vec<Result<bool, ModelError>>) -> Self {
            self.scripts
                .lock()
                .entry(step.trim().to_string())
                .or_default()
                .intents
                .extend(answers);
            self
        }

        /// Every call made, as `"<method>:<step text>"`
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        /// Number of calls of `method` for any step
        pub fn count(&self, method: &str) -> usize {
            let prefix = format!("{}:", method);
            self.calls
                .lock()
                .iter()
                .filter(|call| call.starts_with(&prefix))
                .count()
        }

        fn record(&self, method: &str, prompt: &StepPrompt) {
            self.calls
                .lock()
                .push(format!("{}:{}", method, prompt.step.text));
        }

        fn peek(&self, prompt: &StepPrompt) -> Result<ScriptedAction, ModelError> {
            let scripts = self.scripts.lock();
            let script = scripts.get(&prompt.step.text).ok_or_else(|| {
                ModelError::Unavailable(format!("no script for '{}'", prompt.step.text))
            })?;
            script
                .actions
                .front()
                .or(script.fallback.as_ref())
                .cloned()
                .ok_or_else(|| {
                    ModelError::Unavailable(format!("script for '{}' exhausted", prompt.step.text))
                })
        }

        fn pop(&self, prompt: &StepPrompt) -> Result<ScriptedAction, ModelError> {
            let next = self.peek(prompt)?;
            if let Some(script) = self.scripts.lock().get_mut(&prompt.step.text) {
                script.actions.pop_front();
            }
            Ok(next)
        }

        fn mismatch(expected: &str, got: &ScriptedAction) -> ModelError {
            ModelError::InvalidResponse(format!("expected {} plan, script has {:?}", expected, got))
        }
    }

    #[async_trait]
    impl DecisionModel for ScriptedModel {
        async fn classify_action(&self, prompt: &StepPrompt) -> Result<ActionKind, ModelError> {
            self.record("classify", prompt);
            let next = self.peek(prompt)?;
            if let ScriptedAction::Fail(_) = next {
                self.pop(prompt)?;
            }
            next.kind()
        }

        async fn plan_navigation(&self, prompt: &StepPrompt) -> Result<NavigationPlan, ModelError> {
            self.record("plan_navigation", prompt);
            match self.pop(prompt)? {
                ScriptedAction::Navigate(plan) => Ok(plan),
                other => Err(Self::mismatch("navigation", &other)),
            }
        }

        async fn plan_click(&self, prompt: &StepPrompt) -> Result<ClickPlan, ModelError> {
            self.record("plan_click", prompt);
            match self.pop(prompt)? {
                ScriptedAction::Click(plan) => Ok(plan),
                other => Err(Self::mismatch("click", &other)),
            }
        }

        async fn plan_form_update(&self, prompt: &StepPrompt) -> Result<FormPlan, ModelError> {
            self.record("plan_form_update", prompt);
            match self.pop(prompt)? {
                ScriptedAction::Form(plan) => Ok(plan),
                other => Err(Self::mismatch("form", &other)),
            }
        }

        async fn plan_assertion(&self, prompt: &StepPrompt) -> Result<AssertionPlan, ModelError> {
            self.record("plan_assertion", prompt);
            match self.pop(prompt)? {
                ScriptedAction::Assert(plan) => Ok(plan),
                other => Err(Self::mismatch("assertion", &other)),
            }
        }

        async fn check_intent(&self, prompt: &StepPrompt) -> Result<bool, ModelError> {
            self.record("check_intent", prompt);
            self.scripts
                .lock()
                .get_mut(&prompt.step.text)
                .and_then(|script| script.intents.pop_front())
                .unwrap_or(Ok(true))
        }
    }
}
