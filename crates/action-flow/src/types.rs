//! Core types for test execution

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use action_primitives::{ActionKind, DEFAULT_TEST_ID_ATTRIBUTE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stepreplay_core_types::{Fingerprint, RunId, Step};
use stepreplay_snapshot_store::{ExecutedStep, RecordedAction, Snapshot};
use tokio_util::sync::CancellationToken;

use crate::model::StepHistory;

/// Default bound on actions per step
pub const DEFAULT_MAX_ACTIONS_PER_STEP: u32 = 10;

/// States of one test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Initialize,
    CheckSnapshot,
    Replay,
    ScreenshotBaseline,
    /// Entry of the step loop: consult the per-step cache
    StepStart,
    ClassifyAction,
    Navigate,
    Click,
    FormUpdate,
    Assert,
    IntentCheck,
    StepComplete,
    Persist,
    Done,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a state's handler, input of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    Initialized,
    SnapshotUsable,
    SnapshotUnusable,
    ReplaySucceeded,
    ReplayFailed,
    BaselineCaptured,
    /// The step was replayed from the per-step cache
    StepReplayed,
    /// The step needs model-driven actions
    StepNeedsActions,
    /// Every step is done
    NoStepsLeft,
    Classified(ActionKind),
    /// Classification or planning failed; counts as not accomplished
    DecisionFailed,
    ActionDone,
    IntentSatisfied,
    IntentPending,
    StepAdvanced,
    Persisted,
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The complete transition table. `None` means the pair is not wired.
pub fn transition(state: FlowState, event: FlowEvent) -> Option<FlowState> {
    use FlowEvent as E;
    use FlowState as S;

    let next = match (state, event) {
        (S::Initialize, E::Initialized) => S::CheckSnapshot,

        (S::CheckSnapshot, E::SnapshotUsable) => S::Replay,
        (S::CheckSnapshot, E::SnapshotUnusable) => S::ScreenshotBaseline,

        (S::Replay, E::ReplaySucceeded) => S::Persist,
        (S::Replay, E::ReplayFailed) => S::ScreenshotBaseline,

        (S::ScreenshotBaseline, E::BaselineCaptured) => S::StepStart,

        (S::StepStart, E::StepReplayed) => S::StepComplete,
        // the first pass through IntentCheck happens before any action
        (S::StepStart, E::StepNeedsActions) => S::IntentCheck,
        (S::StepStart, E::NoStepsLeft) => S::Persist,

        (S::ClassifyAction, E::Classified(ActionKind::Navigation)) => S::Navigate,
        (S::ClassifyAction, E::Classified(ActionKind::Click)) => S::Click,
        (S::ClassifyAction, E::Classified(ActionKind::FormUpdate)) => S::FormUpdate,
        (S::ClassifyAction, E::Classified(ActionKind::Assertion)) => S::Assert,
        (S::ClassifyAction, E::DecisionFailed) => S::IntentCheck,

        (S::Navigate | S::Click | S::FormUpdate | S::Assert, E::ActionDone) => S::IntentCheck,
        (S::Navigate | S::Click | S::FormUpdate | S::Assert, E::DecisionFailed) => {
            S::IntentCheck
        }

        (S::IntentCheck, E::IntentPending) => S::ClassifyAction,
        (S::IntentCheck, E::IntentSatisfied) => S::StepComplete,

        (S::StepComplete, E::StepAdvanced) => S::StepStart,

        (S::Persist, E::Persisted) => S::Done,

        _ => return None,
    };
    Some(next)
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_actions_per_step: u32,
    /// Budget of one action, target resolution included
    pub action_timeout: Duration,
    /// Budget for synthesizing one durable selector
    pub selector_timeout: Duration,
    /// Bounded wait while re-resolving a stored target
    pub wait_timeout: Duration,
    pub troubleshoot: bool,
    pub test_id_attribute: String,
    pub cancel_token: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_actions_per_step: DEFAULT_MAX_ACTIONS_PER_STEP,
            action_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(5),
            troubleshoot: false,
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
            cancel_token: CancellationToken::new(),
        }
    }
}

/// Page seen before regeneration starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageBaseline {
    pub url: String,
    pub title: String,
}

/// How a step got done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    Replayed,
    Regenerated,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub text: String,
    pub source: StepSource,
    pub actions: usize,
    /// Completed by the max-actions bound rather than an intent check
    pub forced: bool,
}

/// How a passing run was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Whole snapshot replayed
    Replayed,
    /// Every step regenerated
    Regenerated,
    /// Some steps from the per-step cache, the rest regenerated
    Mixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub test_key: Fingerprint,
    pub outcome: RunOutcome,
    pub steps: Vec<StepResult>,
    pub model_calls: u32,
    pub driver_actions: u32,
    pub replay_attempted: bool,
    pub replay_failed: bool,
    pub persisted: bool,
    pub baseline: Option<PageBaseline>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Transient state of one run; never persisted
#[derive(Debug)]
pub struct ExecutionState {
    pub run_id: RunId,
    pub test_key: Fingerprint,
    pub steps: Vec<Step>,
    pub step_index: usize,
    /// `ClassifyAction` entries for the current step
    pub action_count: u32,
    pub max_actions_per_step: u32,
    pub snapshot: Option<Snapshot>,
    /// Steps completed in this run
    pub known_good: HashSet<Fingerprint>,
    pub executed: Vec<ExecutedStep>,
    pub results: Vec<StepResult>,
    pub history: Vec<StepHistory>,
    /// Actions completed for the current step
    pub current_actions: Vec<RecordedAction>,
    pub last_failure: Option<String>,
    pub forced: bool,
    /// Set after a whole-snapshot replay failed: regenerate everything
    pub bypass_cache: bool,
    pub replay_attempted: bool,
    pub replay_failed: bool,
    pub persisted: bool,
    pub baseline: Option<PageBaseline>,
    pub model_calls: u32,
    pub driver_actions: u32,
    pub started_at: DateTime<Utc>,
}

impl ExecutionState {
    pub fn new(run_id: RunId, test_key: Fingerprint, steps: Vec<Step>, max_actions: u32) -> Self {
        Self {
            run_id,
            test_key,
            steps,
            step_index: 0,
            action_count: 0,
            max_actions_per_step: max_actions.max(1),
            snapshot: None,
            known_good: HashSet::new(),
            executed: Vec::new(),
            results: Vec::new(),
            history: Vec::new(),
            current_actions: Vec::new(),
            last_failure: None,
            forced: false,
            bypass_cache: false,
            replay_attempted: false,
            replay_failed: false,
            persisted: false,
            baseline: None,
            model_calls: 0,
            driver_actions: 0,
            started_at: Utc::now(),
        }
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.step_index)
    }

    pub fn reset_step(&mut self) {
        self.action_count = 0;
        self.current_actions.clear();
        self.last_failure = None;
        self.forced = false;
    }

    /// Forget regenerated progress before a full regeneration
    pub fn restart(&mut self) {
        self.reset_step();
        self.step_index = 0;
        self.known_good.clear();
        self.executed.clear();
        self.results.clear();
        self.history.clear();
    }

    pub fn outcome(&self) -> RunOutcome {
        let replayed = self
            .results
            .iter()
            .filter(|r| r.source == StepSource::Replayed)
            .count();
        if replayed == self.results.len() {
            RunOutcome::Replayed
        } else if replayed == 0 {
            RunOutcome::Regenerated
        } else {
            RunOutcome::Mixed
        }
    }

    pub fn into_report(self) -> RunReport {
        let outcome = self.outcome();
        RunReport {
            run_id: self.run_id,
            test_key: self.test_key,
            outcome,
            steps: self.results,
            model_calls: self.model_calls,
            driver_actions: self.driver_actions,
            replay_attempted: self.replay_attempted,
            replay_failed: self.replay_failed,
            persisted: self.persisted,
            baseline: self.baseline,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
