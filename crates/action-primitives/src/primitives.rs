//! Action primitives implementation
//!
//! One entry point, [`perform`], runs a stored or freshly decided
//! [`ActionRecord`] against the driver:
//! 1. navigate - absolute or relative URL
//! 2. click - button, modifiers, position, click count
//! 3. form - fill/type/select/check/uncheck
//! 4. assertion - read a property and compare

mod assertion;
mod click;
mod form;
mod navigate;

pub use assertion::*;
pub use click::*;
pub use form::*;
pub use navigate::*;

use tracing::debug;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    types::{ActionRecord, ActionReport, ElementHandle, ExecCtx},
};

/// Run one action record. `target` must be present when
/// [`ActionRecord::requires_target`] is true.
pub async fn perform(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    record: &ActionRecord,
    target: Option<&ElementHandle>,
) -> Result<ActionReport, ActionError> {
    ensure_live(ctx)?;
    debug!(action_id = %ctx.action_id, action = %record.describe(), "performing action");

    let target = match (record.requires_target(), target) {
        (true, None) => {
            return Err(ActionError::InvalidParams(format!(
                "{} requires a target element",
                record.kind()
            )))
        }
        (_, target) => target,
    };

    match record {
        ActionRecord::Navigate { url } => execute_navigate(driver, ctx, url).await,
        ActionRecord::Click { .. } => {
            let options = record.click_options().unwrap_or_default();
            execute_click(driver, ctx, require(target)?, &options).await
        }
        ActionRecord::FormUpdate { operation, value } => {
            execute_form_update(driver, ctx, require(target)?, *operation, value).await
        }
        ActionRecord::Assertion {
            property,
            expected,
            exact,
        } => execute_assertion(driver, ctx, target, *property, expected, *exact).await,
    }
}

fn require(target: Option<&ElementHandle>) -> Result<&ElementHandle, ActionError> {
    target.ok_or_else(|| ActionError::InvalidParams("missing target element".to_string()))
}

pub(crate) fn ensure_live(ctx: &ExecCtx) -> Result<(), ActionError> {
    if ctx.is_cancelled() {
        return Err(ActionError::Interrupted("Context cancelled".to_string()));
    }
    if ctx.is_timeout() {
        return Err(ActionError::WaitTimeout(
            "Context deadline exceeded".to_string(),
        ));
    }
    Ok(())
}
