//! Flow execution error types

use action_locator::LocatorError;
use action_primitives::ActionError;
use stepreplay_snapshot_store::SnapError;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// Test text has nothing to run
    #[error("Invalid test: {0}")]
    InvalidTest(String),

    /// A step gave up after recovery was exhausted
    #[error("Step {step_index} ('{step_text}') failed during {action}: {reason}")]
    StepFailed {
        step_index: usize,
        step_text: String,
        /// Description and parameters of the last attempted action
        action: String,
        reason: String,
    },

    /// The run was cancelled through its token
    #[error("Run cancelled at step {0}")]
    Cancelled(usize),

    /// State machine reached a transition it has no entry for
    #[error("No transition from {state} on {event}")]
    InvalidTransition { state: String, event: String },

    /// Action primitive error
    #[error("Action primitive error: {0}")]
    Action(#[from] ActionError),

    /// Selector resolution error
    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    /// Snapshot store error
    #[error("Snapshot store error: {0}")]
    Snapshot(#[from] SnapError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled(_))
    }
}
