//! Recovery policy for failed actions
//!
//! Failures are classified first, then the class decides how often and
//! how long to wait before the same action is attempted again:
//! - transient: exponential backoff, capped
//! - environment: a few retries at the base delay, the element may appear
//! - logic and permanent: never retried
//! - unknown: one retry

use action_locator::LocatorError;
use action_primitives::ActionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Failure taxonomy used by the recovery layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeouts, not ready, network
    Transient,
    /// Element or selector not found
    Environment,
    /// Invalid parameters, validation failure
    Logic,
    /// Permission denied, blocked, cancelled
    Permanent,
    Unknown,
}

impl ErrorClass {
    pub fn of_action(error: &ActionError) -> Self {
        match error {
            ActionError::NavTimeout(_)
            | ActionError::WaitTimeout(_)
            | ActionError::NotReady(_)
            | ActionError::NotClickable(_)
            | ActionError::StaleElement(_)
            | ActionError::DriverIo(_) => ErrorClass::Transient,
            ActionError::SelectorNotFound(_)
            | ActionError::AmbiguousSelector(_)
            | ActionError::NotEnabled(_)
            | ActionError::OptionNotFound(_) => ErrorClass::Environment,
            ActionError::InvalidParams(_) | ActionError::AssertionFailed { .. } => {
                ErrorClass::Logic
            }
            ActionError::PermissionDenied(_) | ActionError::Interrupted(_) => {
                ErrorClass::Permanent
            }
            ActionError::Internal(_) => ErrorClass::Unknown,
        }
    }

    pub fn of_locator(error: &LocatorError) -> Self {
        match error {
            LocatorError::ElementNotFound(_) | LocatorError::AmbiguousMatch(_) => {
                ErrorClass::Environment
            }
            LocatorError::Timeout(_) => ErrorClass::Transient,
            LocatorError::InvalidSelector(_) | LocatorError::InvalidTarget(_) => ErrorClass::Logic,
            LocatorError::Interrupted(_) => ErrorClass::Permanent,
            LocatorError::Driver(inner) => Self::of_action(inner),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Environment => "environment",
            ErrorClass::Logic => "logic",
            ErrorClass::Permanent => "permanent",
            ErrorClass::Unknown => "unknown",
        }
    }
}

/// Retry budget and delays per error class
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPolicy {
    /// First backoff delay; doubled per attempt for transient failures
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first failed attempt
    pub transient_attempts: u32,
    pub environment_attempts: u32,
    pub unknown_attempts: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            transient_attempts: 4,
            environment_attempts: 3,
            unknown_attempts: 1,
        }
    }
}

impl RecoveryPolicy {
    pub fn max_retries(&self, class: ErrorClass) -> u32 {
        match class {
            ErrorClass::Transient => self.transient_attempts,
            ErrorClass::Environment => self.environment_attempts,
            ErrorClass::Unknown => self.unknown_attempts,
            ErrorClass::Logic | ErrorClass::Permanent => 0,
        }
    }
}

/// Failure handler trait
#[async_trait]
pub trait FailureHandler: Send + Sync {
    /// Decide what follows failed attempt number `attempt` (1-based).
    /// A retry decision has already waited out its backoff.
    async fn handle_failure(
        &self,
        step: &str,
        class: ErrorClass,
        error: &str,
        attempt: u32,
    ) -> FailureHandlerResult;

    /// Check if retry should be attempted
    fn should_retry(&self, class: ErrorClass, attempt: u32) -> bool;

    /// Calculate backoff duration for retry
    fn calculate_backoff(&self, class: ErrorClass, attempt: u32) -> Duration;
}

/// Result of failure handling
#[derive(Debug, Clone, PartialEq)]
pub enum FailureHandlerResult {
    /// Give up on the step
    Abort(String),

    /// Attempt the same action again
    Retry { attempt: u32, backoff_ms: u64 },
}

/// Default failure handler implementation
#[derive(Debug, Clone, Default)]
pub struct DefaultFailureHandler {
    policy: RecoveryPolicy,
}

impl DefaultFailureHandler {
    /// Create a new default failure handler
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }
}

#[async_trait]
impl FailureHandler for DefaultFailureHandler {
    async fn handle_failure(
        &self,
        step: &str,
        class: ErrorClass,
        error: &str,
        attempt: u32,
    ) -> FailureHandlerResult {
        if !self.should_retry(class, attempt) {
            let max = self.policy.max_retries(class);
            warn!(
                step,
                class = class.name(),
                attempt,
                "giving up after {} retries: {}",
                max,
                error
            );
            return FailureHandlerResult::Abort(if max == 0 {
                format!("{} error, not retried: {}", class.name(), error)
            } else {
                format!("Max retry attempts ({}) exceeded: {}", max, error)
            });
        }

        let backoff = self.calculate_backoff(class, attempt);
        info!(
            step,
            class = class.name(),
            attempt,
            "action failed, retrying after {}ms: {}",
            backoff.as_millis(),
            error
        );
        sleep(backoff).await;

        FailureHandlerResult::Retry {
            attempt: attempt + 1,
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    fn should_retry(&self, class: ErrorClass, attempt: u32) -> bool {
        attempt <= self.policy.max_retries(class)
    }

    fn calculate_backoff(&self, class: ErrorClass, attempt: u32) -> Duration {
        match class {
            ErrorClass::Transient => {
                // base * 2^(attempt-1)
                let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.policy
                    .base_delay
                    .saturating_mul(multiplier)
                    .min(self.policy.max_delay)
            }
            ErrorClass::Environment | ErrorClass::Unknown => {
                self.policy.base_delay.min(self.policy.max_delay)
            }
            ErrorClass::Logic | ErrorClass::Permanent => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> DefaultFailureHandler {
        DefaultFailureHandler::new(RecoveryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RecoveryPolicy::default()
        })
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            ErrorClass::of_action(&ActionError::WaitTimeout("x".into())),
            ErrorClass::Transient
        );
        assert_eq!(
            ErrorClass::of_action(&ActionError::SelectorNotFound("x".into())),
            ErrorClass::Environment
        );
        assert_eq!(
            ErrorClass::of_action(&ActionError::InvalidParams("x".into())),
            ErrorClass::Logic
        );
        assert_eq!(
            ErrorClass::of_action(&ActionError::PermissionDenied("x".into())),
            ErrorClass::Permanent
        );
        assert_eq!(
            ErrorClass::of_locator(&LocatorError::Driver(ActionError::DriverIo("x".into()))),
            ErrorClass::Transient
        );
        assert_eq!(
            ErrorClass::of_locator(&LocatorError::ElementNotFound("x".into())),
            ErrorClass::Environment
        );
    }

    #[test]
    fn test_should_retry() {
        let handler = DefaultFailureHandler::default();

        assert!(handler.should_retry(ErrorClass::Transient, 1));
        assert!(handler.should_retry(ErrorClass::Transient, 4));
        assert!(!handler.should_retry(ErrorClass::Transient, 5));

        assert!(handler.should_retry(ErrorClass::Environment, 3));
        assert!(!handler.should_retry(ErrorClass::Environment, 4));

        assert!(handler.should_retry(ErrorClass::Unknown, 1));
        assert!(!handler.should_retry(ErrorClass::Unknown, 2));

        assert!(!handler.should_retry(ErrorClass::Logic, 1));
        assert!(!handler.should_retry(ErrorClass::Permanent, 1));
    }

    #[test]
    fn test_calculate_backoff() {
        let handler = DefaultFailureHandler::default();

        // Exponential backoff
        let transient: Vec<u128> = (1..=5)
            .map(|attempt| handler.calculate_backoff(ErrorClass::Transient, attempt).as_millis())
            .collect();
        assert_eq!(transient, vec![1000, 2000, 4000, 8000, 10_000]);

        // Capped
        assert_eq!(
            handler.calculate_backoff(ErrorClass::Transient, 40).as_millis(),
            10_000
        );

        assert_eq!(
            handler.calculate_backoff(ErrorClass::Environment, 3).as_millis(),
            1000
        );
        assert_eq!(handler.calculate_backoff(ErrorClass::Logic, 1), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_handle_failure_retry_then_abort() {
        let handler = fast();

        let result = handler
            .handle_failure("click Submit", ErrorClass::Environment, "not found", 1)
            .await;
        assert_eq!(
            result,
            FailureHandlerResult::Retry {
                attempt: 2,
                backoff_ms: 1
            }
        );

        match handler
            .handle_failure("click Submit", ErrorClass::Environment, "not found", 4)
            .await
        {
            FailureHandlerResult::Abort(msg) => {
                assert!(msg.contains("Max retry attempts (3)"));
                assert!(msg.contains("not found"));
            }
            other => panic!("Expected Abort result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_logic_errors_are_not_retried() {
        let handler = fast();

        match handler
            .handle_failure("fill email", ErrorClass::Logic, "bad params", 1)
            .await
        {
            FailureHandlerResult::Abort(msg) => assert!(msg.starts_with("logic error")),
            other => panic!("Expected Abort result, got {:?}", other),
        }
    }
}
