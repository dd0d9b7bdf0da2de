//! Error types for locator system

use action_primitives::ActionError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Element not found by the primary descriptor nor the fallback id
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Multiple elements match (ambiguous)
    #[error("Multiple elements match: {0}")]
    AmbiguousMatch(String),

    /// Serialized selector could not be turned back into a descriptor
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Target reference carries neither a descriptor nor a fallback id
    #[error("Invalid target reference: {0}")]
    InvalidTarget(String),

    /// Timeout during resolution
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Resolution cancelled with the run
    #[error("Resolution interrupted: {0}")]
    Interrupted(String),

    /// Driver failure that is not a lookup miss
    #[error("Driver error: {0}")]
    Driver(#[from] ActionError),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::Timeout(_) => true,
            LocatorError::Driver(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Driver(err) => err.severity(),
            LocatorError::Timeout(_) | LocatorError::InvalidSelector(_) => 2,
            LocatorError::ElementNotFound(_) | LocatorError::AmbiguousMatch(_) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_errors_keep_their_class() {
        let err: LocatorError = ActionError::DriverIo("socket closed".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.severity(), 2);
        assert!(!LocatorError::InvalidSelector("bad".into()).is_retryable());
    }
}
