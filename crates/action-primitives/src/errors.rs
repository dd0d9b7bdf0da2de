//! Error types for action primitives

use thiserror::Error;

/// Error types for driver calls and primitive operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Navigation timed out waiting for page load
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Wait operation timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Page is still loading or the driver is not ready for commands
    #[error("Driver not ready: {0}")]
    NotReady(String),

    /// Element is not clickable (obscured, disabled, or not interactable)
    #[error("Element not clickable: {0}")]
    NotClickable(String),

    /// Element is not enabled for interaction
    #[error("Element not enabled: {0}")]
    NotEnabled(String),

    /// Dropdown option was not found
    #[error("Option not found in dropdown: {0}")]
    OptionNotFound(String),

    /// Selector matched no live element
    #[error("Selector not found: {0}")]
    SelectorNotFound(String),

    /// Selector matched more than one element where one was required
    #[error("Selector ambiguous: {0}")]
    AmbiguousSelector(String),

    /// Element handle no longer attached to the document
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Action parameters are invalid
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Assertion read a different value than expected
    #[error("Assertion failed on {property}: expected '{expected}', got '{actual}'")]
    AssertionFailed {
        property: String,
        expected: String,
        actual: String,
    },

    /// Driver transport or protocol error
    #[error("Driver I/O error: {0}")]
    DriverIo(String),

    /// Browser or page refused the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_)
                | ActionError::WaitTimeout(_)
                | ActionError::NotReady(_)
                | ActionError::NotClickable(_)
                | ActionError::StaleElement(_)
                | ActionError::DriverIo(_)
        )
    }

    /// Element lookups that may succeed once the page settles
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            ActionError::SelectorNotFound(_) | ActionError::AmbiguousSelector(_)
        )
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) => 3,
            ActionError::NavTimeout(_)
            | ActionError::PermissionDenied(_)
            | ActionError::DriverIo(_)
            | ActionError::AssertionFailed { .. } => 2,
            ActionError::WaitTimeout(_)
            | ActionError::SelectorNotFound(_)
            | ActionError::StaleElement(_)
            | ActionError::NotEnabled(_) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ActionError::WaitTimeout("x".into()).is_retryable());
        assert!(ActionError::DriverIo("reset".into()).is_retryable());
        assert!(!ActionError::InvalidParams("x".into()).is_retryable());
        assert!(!ActionError::PermissionDenied("x".into()).is_retryable());
        assert!(ActionError::SelectorNotFound("x".into()).is_lookup_failure());
    }

    #[test]
    fn test_assertion_message() {
        let err = ActionError::AssertionFailed {
            property: "title".into(),
            expected: "Home".into(),
            actual: "Login".into(),
        };
        assert_eq!(
            err.to_string(),
            "Assertion failed on title: expected 'Home', got 'Login'"
        );
        assert_eq!(err.severity(), 2);
    }
}
