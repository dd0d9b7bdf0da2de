//! Click primitive

use chrono::Utc;
use std::time::Instant;
use tracing::info;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    types::{ActionReport, ClickOptions, ElementHandle, ExecCtx},
};

/// Execute click primitive
///
/// The element is already resolved; the driver is responsible for
/// scrolling it into view and dispatching the mouse events.
pub async fn execute_click(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    target: &ElementHandle,
    options: &ClickOptions,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    if options.click_count == 0 {
        return Err(ActionError::InvalidParams(
            "click count must be at least 1".to_string(),
        ));
    }

    info!(
        action_id = %ctx.action_id,
        node = %target.node_id,
        button = ?options.button,
        "Executing click primitive"
    );

    driver.click(ctx, target, options).await?;

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    let mut report = ActionReport::success(
        format!("{:?} click on {}", options.button, target.node_id).to_lowercase(),
        started_at,
        latency_ms,
    );
    if let Ok(url) = driver.current_url(ctx).await {
        report = report.with_url(url);
    }
    Ok(report)
}
