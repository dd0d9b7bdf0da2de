//! Selector resolver with fallback chain orchestration

use action_primitives::{
    query_chain, BrowserDriver, ElementAttributes, ElementHandle, ExecCtx, SelectorDescriptor,
    DEFAULT_TEST_ID_ATTRIBUTE,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    errors::LocatorError,
    scoring::select_best_candidate,
    strategies::{container_descriptor, default_strategies, CssFallbackStrategy, Strategy},
    types::{Candidate, LocatorStrategy, ResolutionKind, ResolutionResult},
};

/// Default budget for all match counting of one resolution
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Selector resolver trait
#[async_trait]
pub trait SelectorResolver: Send + Sync {
    /// Synthesize a durable descriptor for the element described by `attrs`.
    ///
    /// `fallback_id` identifies the intended element among several matches.
    /// `Ok(None)` means no strategy can describe the element at all.
    async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        attrs: &ElementAttributes,
        fallback_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<ResolutionResult>, LocatorError>;

    /// Read a live element's attributes, then resolve them
    async fn resolve_handle(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        handle: &ElementHandle,
        timeout: Option<Duration>,
    ) -> Result<Option<ResolutionResult>, LocatorError> {
        let attrs = driver.describe(ctx, handle).await?;
        let fallback_id = handle.marker.clone().or_else(|| attrs.fallback_id.clone());
        self.resolve(driver, ctx, &attrs, fallback_id.as_deref(), timeout)
            .await
    }
}

/// Default selector resolver implementation
pub struct DefaultSelectorResolver {
    strategies: Vec<Arc<dyn Strategy>>,
    default_timeout: Duration,
}

impl Default for DefaultSelectorResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultSelectorResolver {
    /// Create a new resolver with all strategies
    pub fn new() -> Self {
        Self::with_test_id_attribute(DEFAULT_TEST_ID_ATTRIBUTE)
    }

    /// Resolver reading a custom test id attribute
    pub fn with_test_id_attribute(attribute: &str) -> Self {
        Self {
            strategies: default_strategies(attribute),
            default_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Matches of `descriptor`, or `None` once the budget is spent.
    /// Driver errors count as no match.
    async fn matches(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        descriptor: &SelectorDescriptor,
        deadline: Instant,
    ) -> Option<Vec<ElementHandle>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, query_chain(driver, ctx, descriptor)).await {
            Ok(Ok(handles)) => Some(handles),
            Ok(Err(err)) => {
                warn!(selector = %descriptor, error = %err, "selector query failed; counting as no match");
                Some(Vec::new())
            }
            Err(_) => {
                warn!(selector = %descriptor, "selector query exceeded resolution budget");
                None
            }
        }
    }
}

/// A unique match only counts when it is the intended element
fn points_at(handle: &ElementHandle, fallback_id: Option<&str>) -> bool {
    match (handle.marker.as_deref(), fallback_id) {
        (Some(marker), Some(expected)) => marker == expected,
        _ => true,
    }
}

fn unique(
    descriptor: SelectorDescriptor,
    strategy: LocatorStrategy,
    kind: ResolutionKind,
) -> Option<ResolutionResult> {
    info!(strategy = strategy.name(), selector = %descriptor, "resolved unique selector");
    Some(ResolutionResult::from_candidate(
        Candidate::new(descriptor, strategy, 1),
        kind,
    ))
}

#[async_trait]
impl SelectorResolver for DefaultSelectorResolver {
    async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        attrs: &ElementAttributes,
        fallback_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<ResolutionResult>, LocatorError> {
        if attrs.is_degenerate() {
            debug!("element has no usable attributes");
            return Ok(None);
        }

        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        let scope = attrs.container.as_deref().and_then(container_descriptor);
        let mut fallbacks: Vec<Candidate> = Vec::new();
        let mut css_fallback: Option<SelectorDescriptor> = None;

        for strategy in &self.strategies {
            if ctx.is_cancelled() {
                return Err(LocatorError::Interrupted("Context cancelled".to_string()));
            }
            let strategy_type = strategy.strategy_type();

            let Some(descriptor) = strategy.build(attrs) else {
                debug!(strategy = strategy.name(), "precondition attribute absent; skipping");
                continue;
            };
            if strategy_type == LocatorStrategy::Css {
                css_fallback = Some(descriptor.clone());
            }

            let Some(handles) = self.matches(driver, ctx, &descriptor, deadline).await else {
                break;
            };
            debug!(strategy = strategy.name(), selector = %descriptor, count = handles.len(), "strategy tried");

            match handles.as_slice() {
                [] => continue,
                [only] if points_at(only, fallback_id) => {
                    return Ok(unique(descriptor, strategy_type, ResolutionKind::Unique));
                }
                [_] => {
                    debug!(strategy = strategy.name(), "unique match is a different element");
                    continue;
                }
                _ => {}
            }

            let mut best = (descriptor, handles);

            if let Some(exact) = strategy.exact_variant(attrs) {
                if let Some(exact_handles) = self.matches(driver, ctx, &exact, deadline).await {
                    let count = exact_handles.len();
                    if count == 1 && points_at(&exact_handles[0], fallback_id) {
                        return Ok(unique(exact, strategy_type, ResolutionKind::Unique));
                    }
                    if count > 1 && count < best.1.len() {
                        best = (exact, exact_handles);
                    }
                }
            }

            if let Some(scope) = &scope {
                let scoped = scope.clone().with_child(best.0.clone());
                if let Some(scoped_handles) = self.matches(driver, ctx, &scoped, deadline).await {
                    if let [only] = scoped_handles.as_slice() {
                        if points_at(only, fallback_id) {
                            return Ok(unique(scoped, strategy_type, ResolutionKind::Scoped));
                        }
                    }
                }
            }

            let nth = fallback_id
                .and_then(|id| best.1.iter().position(|h| h.marker.as_deref() == Some(id)))
                .unwrap_or(0);
            let candidate = Candidate::new(best.0.with_nth(nth), strategy_type, best.1.len());
            debug!(
                strategy = strategy.name(),
                nth,
                confidence = candidate.confidence,
                "recorded fallback-with-nth candidate"
            );
            fallbacks.push(candidate);
        }

        if let Some(best) = select_best_candidate(&fallbacks) {
            info!(
                strategy = best.strategy.name(),
                selector = %best.descriptor,
                confidence = best.confidence,
                "no unique selector; using best fallback-with-nth"
            );
            return Ok(Some(ResolutionResult::from_candidate(
                best.clone(),
                ResolutionKind::FallbackNth,
            )));
        }

        let css = css_fallback.or_else(|| CssFallbackStrategy.build(attrs));
        if let Some(css) = &css {
            warn!(selector = %css, "no strategy matched; emitting css last resort");
        }
        Ok(css.map(|descriptor| {
            ResolutionResult::from_candidate(
                Candidate::new(descriptor, LocatorStrategy::Css, 0),
                ResolutionKind::CssLastResort,
            )
        }))
    }
}
