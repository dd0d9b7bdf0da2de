//! Durable element references
//!
//! A [`TargetReference`] is the best known pointer to an element: a primary
//! descriptor plus the stable fallback id from the marking pass. Neither is
//! guaranteed to still be valid.

use action_primitives::{BrowserDriver, ElementHandle, ExecCtx, SelectorDescriptor, WaitStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    errors::LocatorError,
    serialize::{deserialize_selector, serialize_selector, SerializedSelector},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetReference {
    pub primary: Option<SelectorDescriptor>,
    pub fallback_id: Option<String>,
}

/// Which half of the reference found the element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Primary,
    FallbackId,
}

#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub handle: ElementHandle,
    pub source: TargetSource,
}

/// Stored form of a [`TargetReference`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SerializedSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_id: Option<String>,
}

impl TargetReference {
    pub fn new(primary: Option<SelectorDescriptor>, fallback_id: Option<String>) -> Self {
        Self {
            primary,
            fallback_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.fallback_id.is_none()
    }

    /// Primary descriptor first, each within the bounded wait; the fallback
    /// id only when the primary does not settle on exactly one element.
    pub async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        ctx: &ExecCtx,
        wait: &WaitStrategy,
    ) -> Result<ResolvedTarget, LocatorError> {
        if self.is_empty() {
            return Err(LocatorError::InvalidTarget(
                "no selector and no fallback id".to_string(),
            ));
        }

        let mut primary_failure = None;
        if let Some(primary) = &self.primary {
            match wait.wait_for_single(driver, ctx, primary).await {
                Ok(handle) => {
                    debug!(selector = %primary, "target resolved by primary selector");
                    return Ok(ResolvedTarget {
                        handle,
                        source: TargetSource::Primary,
                    });
                }
                Err(err) if err.is_lookup_failure() => {
                    warn!(selector = %primary, error = %err, "primary selector did not resolve");
                    primary_failure = Some(err.to_string());
                }
                Err(err) => return Err(err.into()),
            }
        }

        let describe_failure = |detail: String| match &primary_failure {
            Some(primary) => format!("{}; {}", primary, detail),
            None => detail,
        };

        let Some(fallback_id) = &self.fallback_id else {
            return Err(LocatorError::ElementNotFound(describe_failure(
                "no fallback id".to_string(),
            )));
        };

        match wait.wait_for_marker(driver, ctx, fallback_id).await {
            Ok(handle) => {
                debug!(fallback_id = %fallback_id, "target resolved by fallback id");
                Ok(ResolvedTarget {
                    handle,
                    source: TargetSource::FallbackId,
                })
            }
            Err(err) if err.is_lookup_failure() => {
                Err(LocatorError::ElementNotFound(describe_failure(err.to_string())))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn to_serialized(&self) -> SerializedTarget {
        SerializedTarget {
            selector: self.primary.as_ref().map(serialize_selector),
            fallback_id: self.fallback_id.clone(),
        }
    }

    pub fn from_serialized(stored: &SerializedTarget) -> Result<Self, LocatorError> {
        Ok(Self {
            primary: stored.selector.as_ref().map(deserialize_selector).transpose()?,
            fallback_id: stored.fallback_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::fake::FakePage;
    use action_primitives::ElementAttributes;
    use std::time::Duration;
    use stepreplay_core_types::RunId;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecCtx {
        ExecCtx::new(RunId::new(), Duration::from_secs(5), CancellationToken::new())
    }

    fn quick() -> WaitStrategy {
        WaitStrategy {
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_primary_preferred() {
        let page = FakePage::new("https://app.test/");
        page.add(ElementAttributes::new("button").with_test_id("go").with_fallback_id("1"));
        page.add(ElementAttributes::new("button").with_fallback_id("2"));
        let target = TargetReference::new(Some(SelectorDescriptor::test_id("go")), Some("2".into()));
        let resolved = target.resolve(&page, &ctx(), &quick()).await.unwrap();
        assert_eq!(resolved.source, TargetSource::Primary);
        assert_eq!(resolved.handle.marker.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_stale_primary_falls_back_to_marker() {
        let page = FakePage::new("https://app.test/");
        page.add(ElementAttributes::new("button").with_test_id("go-v2").with_fallback_id("1"));
        let target = TargetReference::new(Some(SelectorDescriptor::test_id("go")), Some("1".into()));
        let resolved = target.resolve(&page, &ctx(), &quick()).await.unwrap();
        assert_eq!(resolved.source, TargetSource::FallbackId);
    }

    #[tokio::test]
    async fn test_ambiguous_primary_falls_back_to_marker() {
        let page = FakePage::new("https://app.test/");
        page.add(ElementAttributes::new("a").with_text("More").with_fallback_id("1"));
        page.add(ElementAttributes::new("a").with_text("More").with_fallback_id("2"));
        let primary = SelectorDescriptor::css("a");
        let target = TargetReference::new(Some(primary), Some("2".into()));
        let resolved = target.resolve(&page, &ctx(), &quick()).await.unwrap();
        assert_eq!(resolved.handle.marker.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_both_stale() {
        let page = FakePage::new("https://app.test/");
        let target = TargetReference::new(Some(SelectorDescriptor::test_id("go")), Some("1".into()));
        let err = target.resolve(&page, &ctx(), &quick()).await.unwrap_err();
        assert!(matches!(err, LocatorError::ElementNotFound(_)));
        assert!(matches!(
            TargetReference::default().resolve(&page, &ctx(), &quick()).await,
            Err(LocatorError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_serialized_round_trip() {
        let target = TargetReference::new(
            Some(SelectorDescriptor::test_id("form").with_child(SelectorDescriptor::css("input"))),
            Some("12".into()),
        );
        let json = serde_json::to_string(&target.to_serialized()).unwrap();
        assert!(json.contains("\"fallbackId\":\"12\""));
        let stored: SerializedTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(TargetReference::from_serialized(&stored).unwrap(), target);
    }
}
