//! Test executor implementation
//!
//! A run is a single loop over [`FlowState`]: each state's handler does its
//! work and returns a [`FlowEvent`], and [`transition`] picks the next
//! state. Steps are processed strictly in order; every await is a driver,
//! model or store call.

use crate::errors::FlowError;
use crate::model::{DecisionModel, ModelError, StepHistory, StepPrompt};
use crate::strategies::{DefaultFailureHandler, ErrorClass, FailureHandler, FailureHandlerResult};
use crate::types::*;
use action_locator::{DefaultSelectorResolver, SelectorResolver, TargetReference};
use action_primitives::{
    perform, ActionError, ActionRecord, BrowserDriver, ExecCtx, PageState, WaitStrategy,
};
use async_trait::async_trait;
use std::sync::Arc;
use stepreplay_core_types::{RunId, Step, TestCase};
use stepreplay_snapshot_store::{
    ExecutedStep, RecordedAction, ReplayExecutor, SaveRequest, SnapshotStep, SnapshotStore,
};
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};

/// Test executor trait
#[async_trait]
pub trait FlowExecutor: Send + Sync {
    /// Run every step of `test` against `driver`
    async fn execute(
        &self,
        test: &TestCase,
        driver: &dyn BrowserDriver,
        options: &RunOptions,
    ) -> Result<RunReport, FlowError>;
}

/// Default executor: snapshot first, model-driven regeneration otherwise
pub struct DefaultFlowExecutor {
    store: Arc<dyn SnapshotStore>,
    model: Arc<dyn DecisionModel>,
    /// Built per run from `RunOptions::test_id_attribute` when unset
    resolver: Option<Arc<dyn SelectorResolver>>,
    failure_handler: Arc<dyn FailureHandler>,
}

/// Everything one run needs besides the executor's collaborators
struct RunCtx<'a> {
    test: &'a TestCase,
    driver: &'a dyn BrowserDriver,
    ctx: ExecCtx,
    options: &'a RunOptions,
    replay: ReplayExecutor,
    resolver: Arc<dyn SelectorResolver>,
    state: ExecutionState,
    /// Prompt of the last classification, consumed by the action state
    prompt: Option<StepPrompt>,
    /// Last classification or plan failed; the intent check is skipped
    decision_failed: bool,
}

impl RunCtx<'_> {
    fn action_ctx(&self) -> ExecCtx {
        self.ctx.for_action(self.options.action_timeout)
    }

    fn step(&self) -> Result<Step, FlowError> {
        self.state.current_step().cloned().ok_or_else(|| {
            FlowError::Internal(format!("no step at index {}", self.state.step_index))
        })
    }

    fn ensure_live(&self) -> Result<(), FlowError> {
        if self.options.cancel_token.is_cancelled() {
            return Err(FlowError::Cancelled(self.state.step_index));
        }
        Ok(())
    }
}

impl DefaultFlowExecutor {
    /// Create a new executor
    pub fn new(store: Arc<dyn SnapshotStore>, model: Arc<dyn DecisionModel>) -> Self {
        Self {
            store,
            model,
            resolver: None,
            failure_handler: Arc::new(DefaultFailureHandler::default()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SelectorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = handler;
        self
    }

    async fn drive(&self, run: &mut RunCtx<'_>) -> Result<(), FlowError> {
        let mut flow = FlowState::Initialize;

        while flow != FlowState::Done {
            run.ensure_live()?;
            let event = match flow {
                FlowState::Initialize => {
                    info!(steps = run.state.steps.len(), key = %run.state.test_key, "run started");
                    FlowEvent::Initialized
                }
                FlowState::CheckSnapshot => self.check_snapshot(run).await,
                FlowState::Replay => self.replay_snapshot(run).await?,
                FlowState::ScreenshotBaseline => self.capture_baseline(run).await,
                FlowState::StepStart => self.start_step(run).await?,
                FlowState::ClassifyAction => self.classify(run).await,
                FlowState::Navigate
                | FlowState::Click
                | FlowState::FormUpdate
                | FlowState::Assert => self.run_action(flow, run).await?,
                FlowState::IntentCheck => self.check_intent(run).await?,
                FlowState::StepComplete => {
                    run.state.step_index += 1;
                    run.state.reset_step();
                    FlowEvent::StepAdvanced
                }
                FlowState::Persist => self.persist(run).await,
                FlowState::Done => break,
            };

            let next = transition(flow, event).ok_or_else(|| FlowError::InvalidTransition {
                state: flow.to_string(),
                event: event.to_string(),
            })?;
            debug!(from = %flow, event = %event, to = %next, "transition");
            flow = next;
        }
        Ok(())
    }

    async fn check_snapshot(&self, run: &mut RunCtx<'_>) -> FlowEvent {
        let key = run.state.test_key.clone();
        run.state.snapshot = match self.store.get_snapshot(&key).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(key = %key, error = %err, "snapshot unavailable");
                None
            }
        };
        if let Some(snapshot) = &run.state.snapshot {
            run.state.bypass_cache = snapshot.flags.force_regenerate;
        }

        let usable = match self
            .store
            .should_use_snapshot(&key, &run.state.steps, run.options.troubleshoot)
            .await
        {
            Ok(usable) => usable,
            Err(err) => {
                warn!(key = %key, error = %err, "snapshot check failed, regenerating");
                false
            }
        };
        info!(key = %key, usable, troubleshoot = run.options.troubleshoot, "snapshot checked");
        if usable && run.state.snapshot.is_some() {
            FlowEvent::SnapshotUsable
        } else {
            FlowEvent::SnapshotUnusable
        }
    }

    async fn replay_snapshot(&self, run: &mut RunCtx<'_>) -> Result<FlowEvent, FlowError> {
        let Some(snapshot) = run.state.snapshot.clone() else {
            return Ok(FlowEvent::ReplayFailed);
        };
        run.state.replay_attempted = true;

        match run
            .replay
            .replay(&snapshot, &run.state.steps, run.driver, &run.ctx)
            .await
        {
            Ok(outcome) => {
                run.state.driver_actions += outcome.actions as u32;
                for replayed in &outcome.steps {
                    if let Some(cached) = snapshot.step(&replayed.step.fingerprint) {
                        record_step(
                            &mut run.state,
                            &replayed.step,
                            StepSource::Replayed,
                            ExecutedStep::from_cached(replayed.step.clone(), cached),
                            false,
                        );
                    }
                }
                run.state.step_index = run.state.steps.len();
                info!(actions = outcome.actions, "snapshot replayed without model calls");
                Ok(FlowEvent::ReplaySucceeded)
            }
            Err(err) if err.is_interrupted() => Err(FlowError::Cancelled(err.step_index())),
            Err(err) => {
                warn!(step = err.step_index(), error = %err, "replay failed, regenerating every step");
                run.state.replay_failed = true;
                self.record_failure(run, &err.to_string()).await;
                run.state.bypass_cache = true;
                run.state.restart();
                Ok(FlowEvent::ReplayFailed)
            }
        }
    }

    async fn capture_baseline(&self, run: &mut RunCtx<'_>) -> FlowEvent {
        let ctx = run.action_ctx();
        let url = run.driver.current_url(&ctx).await.unwrap_or_else(|err| {
            warn!(error = %err, "baseline url unavailable");
            String::new()
        });
        let title = run.driver.title(&ctx).await.unwrap_or_default();
        debug!(url = %url, title = %title, "baseline captured");
        run.state.baseline = Some(PageBaseline { url, title });
        FlowEvent::BaselineCaptured
    }

    async fn start_step(&self, run: &mut RunCtx<'_>) -> Result<FlowEvent, FlowError> {
        let Some(step) = run.state.current_step().cloned() else {
            return Ok(FlowEvent::NoStepsLeft);
        };
        run.state.reset_step();
        run.decision_failed = false;

        let cached: Option<SnapshotStep> = if run.state.bypass_cache {
            None
        } else {
            run.state
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.step(&step.fingerprint))
                .cloned()
        };

        if let Some(cached) = cached {
            match run
                .replay
                .replay_step(&step, &cached, run.driver, &run.ctx)
                .await
            {
                Ok(actions) => {
                    run.state.driver_actions += actions as u32;
                    info!(step = step.index, actions, "step replayed from cache");
                    let executed = ExecutedStep::from_cached(step.clone(), &cached);
                    record_step(&mut run.state, &step, StepSource::Replayed, executed, false);
                    return Ok(FlowEvent::StepReplayed);
                }
                Err(err) if err.is_interrupted() => {
                    return Err(FlowError::Cancelled(step.index))
                }
                Err(err) => {
                    warn!(step = step.index, error = %err, "cached step failed, regenerating it");
                    run.state.replay_failed = true;
                    self.record_failure(run, &err.to_string()).await;
                }
            }
        }

        info!(step = step.index, text = %step.text, "regenerating step");
        Ok(FlowEvent::StepNeedsActions)
    }

    async fn classify(&self, run: &mut RunCtx<'_>) -> FlowEvent {
        run.state.action_count += 1;
        let prompt = match self.build_prompt(run).await {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(error = %err, "could not build prompt");
                run.decision_failed = true;
                run.state.last_failure = Some(err.to_string());
                return FlowEvent::DecisionFailed;
            }
        };
        run.state.model_calls += 1;

        match self.model.classify_action(&prompt).await {
            Ok(kind) => {
                debug!(step = prompt.step.index, attempt = run.state.action_count, kind = %kind, "action classified");
                run.prompt = Some(prompt);
                FlowEvent::Classified(kind)
            }
            Err(err) => {
                warn!(step = prompt.step.index, error = %err, "classification failed, treating step as not accomplished");
                run.decision_failed = true;
                run.state.last_failure = Some(err.to_string());
                FlowEvent::DecisionFailed
            }
        }
    }

    async fn run_action(
        &self,
        flow: FlowState,
        run: &mut RunCtx<'_>,
    ) -> Result<FlowEvent, FlowError> {
        let prompt = run
            .prompt
            .take()
            .ok_or_else(|| FlowError::Internal(format!("{} entered without a prompt", flow)))?;
        run.state.model_calls += 1;

        let planned: Result<(ActionRecord, Option<String>), ModelError> = match flow {
            FlowState::Navigate => self
                .model
                .plan_navigation(&prompt)
                .await
                .map(|plan| (ActionRecord::Navigate { url: plan.url }, None)),
            FlowState::Click => self.model.plan_click(&prompt).await.map(|plan| {
                (
                    ActionRecord::Click {
                        button: plan.button,
                        modifiers: plan.modifiers,
                        position: plan.position,
                        click_count: plan.click_count,
                    },
                    Some(plan.target),
                )
            }),
            FlowState::FormUpdate => self.model.plan_form_update(&prompt).await.map(|plan| {
                (
                    ActionRecord::FormUpdate {
                        operation: plan.operation,
                        value: plan.value,
                    },
                    Some(plan.target),
                )
            }),
            FlowState::Assert => self.model.plan_assertion(&prompt).await.map(|plan| {
                (
                    ActionRecord::Assertion {
                        property: plan.property,
                        expected: plan.expected,
                        exact: plan.exact,
                    },
                    plan.target,
                )
            }),
            other => {
                return Err(FlowError::Internal(format!("{} is not an action state", other)))
            }
        };

        let (record, target) = match planned {
            Ok(planned) => planned,
            Err(err) => {
                warn!(step = prompt.step.index, state = %flow, error = %err, "planning failed, treating step as not accomplished");
                run.decision_failed = true;
                run.state.last_failure = Some(err.to_string());
                return Ok(FlowEvent::DecisionFailed);
            }
        };

        let recorded = self
            .perform_with_recovery(run, &prompt.step, &record, target.as_deref())
            .await?;
        run.state.current_actions.push(recorded);
        run.state.driver_actions += 1;
        Ok(FlowEvent::ActionDone)
    }

    /// Attempt one planned action until it succeeds or the recovery policy
    /// gives up.
    async fn perform_with_recovery(
        &self,
        run: &RunCtx<'_>,
        step: &Step,
        record: &ActionRecord,
        target: Option<&str>,
    ) -> Result<RecordedAction, FlowError> {
        let describe = || match target {
            Some(id) if record.requires_target() => {
                format!("{} on element {}", record.describe(), id)
            }
            _ => record.describe(),
        };
        let mut attempt = 1;

        loop {
            run.ensure_live()?;
            let ctx = run.action_ctx();
            let result = match timeout(
                run.options.action_timeout,
                self.attempt_action(run, &ctx, record, target),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ActionError::WaitTimeout(format!(
                    "action exceeded {:?}",
                    run.options.action_timeout
                ))),
            };

            let err = match result {
                Ok(recorded) => {
                    debug!(step = step.index, action = %describe(), attempt, "action performed");
                    return Ok(recorded);
                }
                Err(ActionError::Interrupted(_)) if run.options.cancel_token.is_cancelled() => {
                    return Err(FlowError::Cancelled(step.index))
                }
                Err(err) => err,
            };

            let class = ErrorClass::of_action(&err);
            let err_text = err.to_string();
            let handled = tokio::select! {
                _ = run.options.cancel_token.cancelled() => {
                    return Err(FlowError::Cancelled(step.index))
                }
                handled = self
                    .failure_handler
                    .handle_failure(&step.text, class, &err_text, attempt) => handled,
            };
            match handled {
                FailureHandlerResult::Retry { attempt: next, .. } => attempt = next,
                FailureHandlerResult::Abort(reason) => {
                    return Err(FlowError::StepFailed {
                        step_index: step.index,
                        step_text: step.text.clone(),
                        action: describe(),
                        reason,
                    })
                }
            }
        }
    }

    async fn attempt_action(
        &self,
        run: &RunCtx<'_>,
        ctx: &ExecCtx,
        record: &ActionRecord,
        target: Option<&str>,
    ) -> Result<RecordedAction, ActionError> {
        if !record.requires_target() {
            perform(run.driver, ctx, record, None).await?;
            return Ok(RecordedAction::new(record.clone(), None));
        }

        let id = target.ok_or_else(|| {
            ActionError::InvalidParams(format!("{} planned without a target", record.kind()))
        })?;
        let handle = run
            .driver
            .find_by_fallback_id(ctx, id)
            .await?
            .ok_or_else(|| ActionError::SelectorNotFound(format!("no element marked '{}'", id)))?;

        // Synthesize the durable selector before acting: the action may
        // change the page.
        let descriptor = match run
            .resolver
            .resolve_handle(run.driver, ctx, &handle, Some(run.options.selector_timeout))
            .await
        {
            Ok(Some(resolution)) => {
                debug!(
                    selector = %resolution.descriptor,
                    strategy = %resolution.strategy,
                    confidence = resolution.confidence,
                    "selector synthesized"
                );
                Some(resolution.descriptor)
            }
            Ok(None) => {
                warn!(fallback_id = id, "no selector for element, keeping fallback id only");
                None
            }
            Err(err) => {
                warn!(fallback_id = id, error = %err, "selector synthesis failed, keeping fallback id only");
                None
            }
        };

        perform(run.driver, ctx, record, Some(&handle)).await?;
        Ok(RecordedAction::new(
            record.clone(),
            Some(TargetReference::new(descriptor, Some(id.to_string()))),
        ))
    }

    async fn check_intent(&self, run: &mut RunCtx<'_>) -> Result<FlowEvent, FlowError> {
        let count = run.state.action_count;
        if count == 0 {
            debug!("no action taken yet, skipping intent check");
            return Ok(FlowEvent::IntentPending);
        }
        if count >= run.state.max_actions_per_step {
            warn!(
                step = run.state.step_index,
                actions = count,
                "max actions per step reached, forcing completion"
            );
            run.state.forced = true;
            return self.complete_regenerated(run);
        }
        if std::mem::take(&mut run.decision_failed) {
            return Ok(FlowEvent::IntentPending);
        }

        let prompt = self.build_prompt(run).await?;
        run.state.model_calls += 1;
        match self.model.check_intent(&prompt).await {
            Ok(true) => {
                debug!(step = prompt.step.index, "intent accomplished");
                self.complete_regenerated(run)
            }
            Ok(false) => Ok(FlowEvent::IntentPending),
            Err(err) => {
                warn!(step = prompt.step.index, error = %err, "intent check failed, treating step as not accomplished");
                Ok(FlowEvent::IntentPending)
            }
        }
    }

    fn complete_regenerated(&self, run: &mut RunCtx<'_>) -> Result<FlowEvent, FlowError> {
        let step = run.step()?;
        if run.state.current_actions.is_empty() {
            return Err(FlowError::StepFailed {
                step_index: step.index,
                step_text: step.text.clone(),
                action: "no action".to_string(),
                reason: run
                    .state
                    .last_failure
                    .clone()
                    .unwrap_or_else(|| "no action could be decided".to_string()),
            });
        }
        let executed = ExecutedStep::new(step.clone(), run.state.current_actions.clone());
        let forced = run.state.forced;
        record_step(&mut run.state, &step, StepSource::Regenerated, executed, forced);
        Ok(FlowEvent::IntentSatisfied)
    }

    async fn persist(&self, run: &mut RunCtx<'_>) -> FlowEvent {
        let req = SaveRequest {
            key: run.state.test_key.clone(),
            test_text: run.test.text.clone(),
            expected: run.state.steps.clone(),
            executed: run.state.executed.clone(),
            troubleshoot: run.options.troubleshoot,
        };
        match self.store.save_snapshot(req).await {
            Ok(snapshot) => {
                run.state.persisted = true;
                debug!(steps = snapshot.step_count(), "snapshot persisted");
            }
            Err(err) if err.is_refusal() => {
                info!(reason = %err, "snapshot not persisted");
            }
            Err(err) => {
                warn!(error = %err, "snapshot save failed");
            }
        }
        FlowEvent::Persisted
    }

    async fn record_failure(&self, run: &RunCtx<'_>, reason: &str) {
        if let Err(err) = self.store.record_failure(&run.state.test_key, reason).await {
            warn!(error = %err, "could not record snapshot failure");
        }
    }

    async fn build_prompt(&self, run: &RunCtx<'_>) -> Result<StepPrompt, FlowError> {
        let step = run.step()?;
        let ctx = run.action_ctx();
        let elements = run.driver.marked_elements(&ctx).await.unwrap_or_else(|err| {
            warn!(error = %err, "marked elements unavailable");
            Vec::new()
        });
        let url = run.driver.current_url(&ctx).await.unwrap_or_default();
        let title = run.driver.title(&ctx).await.unwrap_or_default();

        Ok(StepPrompt {
            test: run.test.label(),
            step,
            history: run.state.history.clone(),
            actions_taken: run
                .state
                .current_actions
                .iter()
                .map(|action| action.record.describe())
                .collect(),
            page: PageState {
                url,
                title,
                elements,
            },
        })
    }
}

fn record_step(
    state: &mut ExecutionState,
    step: &Step,
    source: StepSource,
    executed: ExecutedStep,
    forced: bool,
) {
    state.history.push(StepHistory {
        index: step.index,
        text: step.text.clone(),
        actions: executed
            .actions
            .iter()
            .map(|action| action.record.describe())
            .collect(),
    });
    state.results.push(StepResult {
        index: step.index,
        text: step.text.clone(),
        source,
        actions: executed.actions.len(),
        forced,
    });
    state.known_good.insert(step.fingerprint.clone());
    state.executed.push(executed);
}

#[async_trait]
impl FlowExecutor for DefaultFlowExecutor {
    async fn execute(
        &self,
        test: &TestCase,
        driver: &dyn BrowserDriver,
        options: &RunOptions,
    ) -> Result<RunReport, FlowError> {
        let steps = test.steps();
        if steps.is_empty() {
            return Err(FlowError::InvalidTest(format!(
                "'{}' has no steps",
                test.label()
            )));
        }

        let run_id = RunId::new();
        let span = info_span!("run", run_id = %run_id, test = %test.label());
        let state = ExecutionState::new(
            run_id.clone(),
            test.snapshot_key(),
            steps,
            options.max_actions_per_step,
        );
        let mut run = RunCtx {
            test,
            driver,
            ctx: ExecCtx::new(run_id, options.action_timeout, options.cancel_token.clone()),
            options,
            replay: ReplayExecutor::new(
                WaitStrategy::new(options.wait_timeout),
                options.action_timeout,
            ),
            resolver: self.resolver.clone().unwrap_or_else(|| {
                Arc::new(DefaultSelectorResolver::with_test_id_attribute(
                    &options.test_id_attribute,
                ))
            }),
            state,
            prompt: None,
            decision_failed: false,
        };

        async move {
            match self.drive(&mut run).await {
                Ok(()) => {
                    let report = run.state.into_report();
                    info!(
                        outcome = ?report.outcome,
                        model_calls = report.model_calls,
                        driver_actions = report.driver_actions,
                        persisted = report.persisted,
                        "run finished"
                    );
                    Ok(report)
                }
                Err(err) => {
                    if !err.is_cancelled() {
                        self.record_failure(&run, &err.to_string()).await;
                    }
                    warn!(error = %err, "run failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScriptedAction, ScriptedModel};
    use crate::strategies::RecoveryPolicy;
    use action_primitives::fake::{FakeOp, FakePage};
    use action_primitives::ElementAttributes;
    use std::time::Duration;
    use stepreplay_snapshot_store::{SnapPolicyView, SnapshotStoreBuilder};

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<dyn SnapshotStore>,
        page: FakePage,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStoreBuilder::new(SnapPolicyView::with_root(dir.path())).build();
        let page = FakePage::new("https://app.test/");
        page.add(
            ElementAttributes::new("button")
                .with_role("button", Some("Submit"))
                .with_text("Submit")
                .with_fallback_id("1"),
        );
        Harness {
            _dir: dir,
            store,
            page,
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            action_timeout: Duration::from_secs(2),
            selector_timeout: Duration::from_millis(200),
            wait_timeout: Duration::from_millis(50),
            ..RunOptions::default()
        }
    }

    fn executor(store: &Arc<dyn SnapshotStore>, model: &Arc<ScriptedModel>) -> DefaultFlowExecutor {
        DefaultFlowExecutor::new(store.clone(), model.clone()).with_failure_handler(Arc::new(
            DefaultFailureHandler::new(RecoveryPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                ..RecoveryPolicy::default()
            }),
        ))
    }

    #[tokio::test]
    async fn test_bounded_loop_forces_completion() {
        let h = harness();
        let model = Arc::new(
            ScriptedModel::new()
                .always("click Submit", ScriptedAction::click("1"))
                .intents("click Submit", vec![Ok(false); 20]),
        );
        let report = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap();

        assert_eq!(model.count("classify"), 10);
        assert_eq!(report.steps[0].actions, 10);
        assert!(report.steps[0].forced);
        assert!(report.persisted);
        // intent checks after actions 1..=9, the tenth is forced
        assert_eq!(model.count("check_intent"), 9);
    }

    #[tokio::test]
    async fn test_model_failures_keep_trying() {
        let h = harness();
        let model = Arc::new(
            ScriptedModel::new()
                .on_step(
                    "click Submit",
                    vec![
                        ScriptedAction::Fail(ModelError::Timeout),
                        ScriptedAction::click("1"),
                    ],
                )
                .intents("click Submit", vec![Err(ModelError::Timeout), Ok(true)])
                .always("click Submit", ScriptedAction::click("1")),
        );
        let report = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap();

        assert_eq!(model.count("classify"), 3);
        assert_eq!(report.steps[0].actions, 2);
        assert!(!report.steps[0].forced);
    }

    #[tokio::test]
    async fn test_step_without_any_action_fails() {
        let h = harness();
        let model = Arc::new(ScriptedModel::new().always(
            "click Submit",
            ScriptedAction::Fail(ModelError::Unavailable("down".into())),
        ));
        let err = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap_err();
        assert_eq!(model.count("classify"), 10);
        match err {
            FlowError::StepFailed { reason, .. } => assert!(reason.contains("down")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let h = harness();
        h.page.fail_times(
            FakeOp::Click,
            ActionError::NotClickable("covered".into()),
            2,
        );
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        let report = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap();
        assert_eq!(report.steps[0].actions, 1);
        assert_eq!(model.count("plan_click"), 1);
    }

    #[tokio::test]
    async fn test_exhausted_recovery_reports_last_action() {
        let h = harness();
        let model = Arc::new(
            ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("missing")]),
        );
        let err = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap_err();
        match err {
            FlowError::StepFailed {
                step_index,
                action,
                reason,
                ..
            } => {
                assert_eq!(step_index, 0);
                assert_eq!(action, "left click on element missing");
                assert!(reason.contains("Max retry attempts (3)"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let key = TestCase::new("click Submit").snapshot_key();
        assert!(h.store.get_snapshot(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_action_timeout_goes_through_recovery() {
        let h = harness();
        h.page.delay(FakeOp::Click, Duration::from_secs(3));
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        let err = executor(&h.store, &model)
            .execute(
                &TestCase::new("click Submit"),
                &h.page,
                &RunOptions {
                    action_timeout: Duration::from_millis(100),
                    ..options()
                },
            )
            .await
            .unwrap_err();
        match err {
            FlowError::StepFailed {
                step_index, reason, ..
            } => {
                assert_eq!(step_index, 0);
                assert!(reason.contains("Max retry attempts (4)"));
                assert!(reason.contains("Wait timeout"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        // one planned click, re-performed by recovery
        assert_eq!(model.count("plan_click"), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let h = harness();
        h.page
            .fail_times(FakeOp::Click, ActionError::NotClickable("covered".into()), 5);
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        let executor = DefaultFlowExecutor::new(h.store.clone(), model.clone())
            .with_failure_handler(Arc::new(DefaultFailureHandler::new(RecoveryPolicy {
                base_delay: Duration::from_secs(10),
                max_delay: Duration::from_secs(10),
                ..RecoveryPolicy::default()
            })));
        let opts = options();
        let token = opts.cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let err = executor
            .execute(&TestCase::new("click Submit"), &h.page, &opts)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_logic_errors_abort_immediately() {
        let h = harness();
        h.page.fail_next(FakeOp::Click, ActionError::InvalidParams("bad".into()));
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        let err = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::StepFailed { .. }));
        assert!(err.to_string().contains("not retried"));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let h = harness();
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        let opts = options();
        opts.cancel_token.cancel();
        let err = executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &opts)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_empty_test_is_rejected() {
        let h = harness();
        let model = Arc::new(ScriptedModel::new());
        let result = tokio_test::block_on(
            executor(&h.store, &model).execute(&TestCase::new("  \n "), &h.page, &options()),
        );
        assert!(matches!(result, Err(FlowError::InvalidTest(_))));
    }

    #[tokio::test]
    async fn test_recorded_target_is_durable() {
        let h = harness();
        let model =
            Arc::new(ScriptedModel::new().on_step("click Submit", vec![ScriptedAction::click("1")]));
        executor(&h.store, &model)
            .execute(&TestCase::new("click Submit"), &h.page, &options())
            .await
            .unwrap();
        let snapshot = h
            .store
            .get_snapshot(&TestCase::new("click Submit").snapshot_key())
            .await
            .unwrap()
            .unwrap();
        let step = snapshot.ordered_steps()[0].clone();
        let target = step.target_reference.unwrap();
        assert_eq!(target.fallback_id.as_deref(), Some("1"));
        let selector = serde_json::to_value(target.selector.unwrap()).unwrap();
        assert_eq!(selector["type"], "role");
    }
}
