//! Assertion primitive - read a property and compare it

use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    selector::normalize_whitespace,
    types::{ActionReport, AssertProperty, ElementHandle, ExecCtx},
};

/// Execute an assertion.
///
/// `Url` and `Title` read the page; other properties read `target`.
/// Exact comparison is trimmed equality; otherwise the expected value must
/// appear case-insensitively in the actual one. `Visible` always compares
/// as a boolean.
pub async fn execute_assertion(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    target: Option<&ElementHandle>,
    property: AssertProperty,
    expected: &str,
    exact: bool,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let actual = match property {
        AssertProperty::Url => driver.current_url(ctx).await?,
        AssertProperty::Title => driver.title(ctx).await?,
        _ => {
            let target = target.ok_or_else(|| {
                ActionError::InvalidParams(format!(
                    "{} assertion requires a target element",
                    property.name()
                ))
            })?;
            driver.read(ctx, target, property).await?
        }
    };

    debug!(property = property.name(), %actual, %expected, "assertion read");

    if !compare(property, &actual, expected, exact) {
        return Err(ActionError::AssertionFailed {
            property: property.name().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    info!(action_id = %ctx.action_id, property = property.name(), "Assertion passed");
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(ActionReport::success(
        format!("assert {} '{}'", property.name(), expected),
        started_at,
        latency_ms,
    ))
}

pub fn compare(property: AssertProperty, actual: &str, expected: &str, exact: bool) -> bool {
    if property == AssertProperty::Visible {
        return parse_flag(actual) == parse_flag(expected);
    }
    if exact {
        actual.trim() == expected.trim()
    } else {
        normalize_whitespace(actual)
            .to_lowercase()
            .contains(&normalize_whitespace(expected).to_lowercase())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "visible" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare() {
        assert!(compare(AssertProperty::Text, " Welcome back ", "Welcome back", true));
        assert!(!compare(AssertProperty::Text, "Welcome back", "welcome", true));
        assert!(compare(AssertProperty::Text, "Welcome  back, Ada", "BACK, ada", false));
        assert!(compare(AssertProperty::Visible, "true", "visible", false));
        assert!(!compare(AssertProperty::Visible, "false", "true", false));
    }
}
