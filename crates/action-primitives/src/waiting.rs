//! Bounded waiting for elements to settle

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    locator::locate,
    selector::SelectorDescriptor,
    types::{ElementHandle, ExecCtx},
};

/// Polling wait used while a page settles after an action
#[derive(Debug, Clone)]
pub struct WaitStrategy {
    /// Overall budget for one lookup
    pub timeout: Duration,

    /// Delay between attempts
    pub poll_interval: Duration,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Poll until the descriptor resolves to exactly one element.
    ///
    /// Lookup failures (no match, ambiguous) are retried until the budget
    /// or the context deadline runs out, then the last one is returned.
    /// Any other driver error ends the wait immediately.
    pub async fn wait_for_single(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        descriptor: &SelectorDescriptor,
    ) -> Result<ElementHandle, ActionError> {
        let deadline = Instant::now() + self.timeout.min(ctx.remaining_time());
        let mut attempts = 0u32;

        loop {
            if ctx.is_cancelled() {
                return Err(ActionError::Interrupted("Context cancelled".to_string()));
            }
            attempts += 1;

            match locate(driver, ctx, descriptor).await {
                Ok(handle) => return Ok(handle),
                Err(err) if err.is_lookup_failure() => {
                    if Instant::now() + self.poll_interval >= deadline {
                        debug!(
                            selector = %descriptor,
                            attempts,
                            "element did not settle within budget"
                        );
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Poll for the element carrying `fallback_id`
    pub async fn wait_for_marker(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        fallback_id: &str,
    ) -> Result<ElementHandle, ActionError> {
        let deadline = Instant::now() + self.timeout.min(ctx.remaining_time());

        loop {
            if ctx.is_cancelled() {
                return Err(ActionError::Interrupted("Context cancelled".to_string()));
            }
            if let Some(handle) = driver.find_by_fallback_id(ctx, fallback_id).await? {
                return Ok(handle);
            }
            if Instant::now() + self.poll_interval >= deadline {
                return Err(ActionError::SelectorNotFound(format!(
                    "fallback id '{}'",
                    fallback_id
                )));
            }
            sleep(self.poll_interval).await;
        }
    }
}
