//! Step execution state machine
//!
//! Drives one natural-language test through its steps: replay from the
//! snapshot store when the cache covers the test, otherwise ask the
//! decision model for one action at a time until the step's intent is met.
//! Failed actions go through the recovery policy before the step gives up.

pub mod errors;
pub mod executor;
pub mod model;
pub mod strategies;
pub mod types;

pub use errors::FlowError;
pub use executor::{DefaultFlowExecutor, FlowExecutor};
#[cfg(any(test, feature = "fake"))]
pub use model::{ScriptedAction, ScriptedModel};
pub use model::{
    AssertionPlan, ClickPlan, DecisionModel, FormPlan, ModelError, NavigationPlan, StepHistory,
    StepPrompt,
};
pub use strategies::{
    DefaultFailureHandler, ErrorClass, FailureHandler, FailureHandlerResult, RecoveryPolicy,
};
pub use types::{
    transition, ExecutionState, FlowEvent, FlowState, PageBaseline, RunOptions, RunOutcome,
    RunReport, StepResult, StepSource, DEFAULT_MAX_ACTIONS_PER_STEP,
};
