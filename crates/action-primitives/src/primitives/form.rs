//! Form-update primitive - fill, type, select, check, uncheck

use chrono::Utc;
use std::time::Instant;
use tracing::info;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    types::{ActionReport, ElementHandle, ExecCtx, FormOperation},
};

pub async fn execute_form_update(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    target: &ElementHandle,
    operation: FormOperation,
    value: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        action_id = %ctx.action_id,
        node = %target.node_id,
        operation = ?operation,
        "Executing form update primitive"
    );

    match operation {
        FormOperation::Fill => driver.fill(ctx, target, value).await?,
        FormOperation::Type => driver.type_text(ctx, target, value).await?,
        FormOperation::Select => {
            if value.trim().is_empty() {
                return Err(ActionError::InvalidParams(
                    "select requires an option".to_string(),
                ));
            }
            driver.select_option(ctx, target, value).await?
        }
        FormOperation::Check => driver.set_checked(ctx, target, true).await?,
        FormOperation::Uncheck => driver.set_checked(ctx, target, false).await?,
    }

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(
        format!("{:?} on {}", operation, target.node_id).to_lowercase(),
        started_at,
        latency_ms,
    ))
}
