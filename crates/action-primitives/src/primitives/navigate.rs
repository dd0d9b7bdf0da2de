//! Navigate primitive - load a URL, resolving relative targets

use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    types::{ActionReport, ExecCtx},
};

/// Execute navigate primitive
///
/// Relative URLs (`/login`, `../next`) are joined onto the current page
/// URL before the driver is asked to load them.
pub async fn execute_navigate(
    driver: &dyn BrowserDriver,
    ctx: &ExecCtx,
    url: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    let current = driver.current_url(ctx).await?;
    let target = resolve_url(&current, url)?;

    info!(action_id = %ctx.action_id, url = %target, "Executing navigate primitive");

    if let Err(err) = driver.navigate(ctx, &target).await {
        warn!(url = %target, error = %err, "navigation failed");
        return Err(err);
    }

    let latency_ms = start_instant.elapsed().as_millis() as u64;
    Ok(
        ActionReport::success(format!("navigate to {}", target), started_at, latency_ms)
            .with_url(target),
    )
}

/// Join `target` onto `current` unless it is already absolute
pub fn resolve_url(current: &str, target: &str) -> Result<String, ActionError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ActionError::InvalidParams("URL cannot be empty".to_string()));
    }
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(current).map_err(|err| {
        ActionError::InvalidParams(format!(
            "cannot resolve '{}' against '{}': {}",
            target, current, err
        ))
    })?;
    base.join(target)
        .map(|joined| joined.to_string())
        .map_err(|err| {
            ActionError::InvalidParams(format!(
                "cannot resolve '{}' against '{}': {}",
                target, current, err
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://app.test/a/b", "/login").unwrap(),
            "https://app.test/login"
        );
        assert_eq!(
            resolve_url("https://app.test/a/b", "c?x=1").unwrap(),
            "https://app.test/a/c?x=1"
        );
        assert_eq!(
            resolve_url("about:blank", "https://other.test").unwrap(),
            "https://other.test/"
        );
        assert!(resolve_url("about:blank", "/login").is_err());
        assert!(resolve_url("https://app.test/", "  ").is_err());
    }
}
