//! Decision-free re-execution of cached steps
//!
//! Every stored action is performed exactly as recorded: the target is
//! re-resolved (primary selector, then fallback id) and the driver is
//! called with the stored parameters. The first failure is returned; the
//! caller decides whether to regenerate.

use std::time::Duration;

use action_locator::{LocatorError, TargetReference};
use action_primitives::{perform, ActionError, BrowserDriver, ExecCtx, WaitStrategy};
use stepreplay_core_types::Step;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::model::{Snapshot, SnapshotStep, StoredAction};

/// Default per-action budget during replay.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("step {step_index} ('{step_text}') has no cached entry")]
    MissingStep { step_index: usize, step_text: String },

    #[error("step {step_index} ('{step_text}'): target for {action} did not resolve: {source}")]
    Target {
        step_index: usize,
        step_text: String,
        action: String,
        #[source]
        source: LocatorError,
    },

    #[error("step {step_index} ('{step_text}'): {action} failed: {source}")]
    Action {
        step_index: usize,
        step_text: String,
        action: String,
        #[source]
        source: ActionError,
    },
}

impl ReplayError {
    pub fn step_index(&self) -> usize {
        match self {
            ReplayError::MissingStep { step_index, .. }
            | ReplayError::Target { step_index, .. }
            | ReplayError::Action { step_index, .. } => *step_index,
        }
    }

    /// Cancellation of the run, as opposed to a stale cache entry
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ReplayError::Action {
                source: ActionError::Interrupted(_),
                ..
            } | ReplayError::Target {
                source: LocatorError::Interrupted(_)
                    | LocatorError::Driver(ActionError::Interrupted(_)),
                ..
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReplayedStep {
    pub step: Step,
    pub actions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub steps: Vec<ReplayedStep>,
    pub actions: usize,
}

#[derive(Debug, Clone)]
pub struct ReplayExecutor {
    wait: WaitStrategy,
    action_timeout: Duration,
}

impl Default for ReplayExecutor {
    fn default() -> Self {
        Self::new(WaitStrategy::default(), DEFAULT_ACTION_TIMEOUT)
    }
}

impl ReplayExecutor {
    pub fn new(wait: WaitStrategy, action_timeout: Duration) -> Self {
        Self {
            wait,
            action_timeout,
        }
    }

    /// Replay every current step from `snapshot`, in order.
    pub async fn replay(
        &self,
        snapshot: &Snapshot,
        steps: &[Step],
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
    ) -> Result<ReplayOutcome, ReplayError> {
        info!(
            key = %snapshot.test_fingerprint,
            steps = steps.len(),
            "replaying snapshot"
        );
        let mut outcome = ReplayOutcome::default();
        for step in steps {
            let cached = snapshot
                .step(&step.fingerprint)
                .ok_or_else(|| ReplayError::MissingStep {
                    step_index: step.index,
                    step_text: step.text.clone(),
                })?;
            let actions = self.replay_step(step, cached, driver, ctx).await?;
            outcome.actions += actions;
            outcome.steps.push(ReplayedStep {
                step: step.clone(),
                actions,
            });
        }
        Ok(outcome)
    }

    /// Replay one cached step, returning the number of driver actions run.
    pub async fn replay_step(
        &self,
        step: &Step,
        cached: &SnapshotStep,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
    ) -> Result<usize, ReplayError> {
        let actions = cached.actions();
        for stored in &actions {
            self.replay_action(step, stored, driver, ctx).await?;
        }
        debug!(step = step.index, actions = actions.len(), "step replayed");
        Ok(actions.len())
    }

    async fn replay_action(
        &self,
        step: &Step,
        stored: &StoredAction,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
    ) -> Result<(), ReplayError> {
        let record = &stored.action_record;
        let target_err = |source: LocatorError| ReplayError::Target {
            step_index: step.index,
            step_text: step.text.clone(),
            action: record.describe(),
            source,
        };
        let action_err = |source: ActionError| ReplayError::Action {
            step_index: step.index,
            step_text: step.text.clone(),
            action: record.describe(),
            source,
        };

        let action_ctx = ctx.for_action(self.action_timeout);
        let handle = if record.requires_target() {
            let serialized = stored.target_reference.as_ref().ok_or_else(|| {
                target_err(LocatorError::InvalidTarget(
                    "no stored target reference".to_string(),
                ))
            })?;
            let target = TargetReference::from_serialized(serialized).map_err(&target_err)?;
            let resolved = target
                .resolve(driver, &action_ctx, &self.wait)
                .await
                .map_err(&target_err)?;
            Some(resolved.handle)
        } else {
            None
        };

        match timeout(
            action_ctx.remaining_time(),
            perform(driver, &action_ctx, record, handle.as_ref()),
        )
        .await
        {
            Ok(Ok(_report)) => Ok(()),
            Ok(Err(err)) => {
                warn!(step = step.index, action = %record.describe(), error = %err, "replayed action failed");
                Err(action_err(err))
            }
            Err(_) => Err(action_err(ActionError::WaitTimeout(format!(
                "action exceeded {:?}",
                self.action_timeout
            )))),
        }
    }
}
