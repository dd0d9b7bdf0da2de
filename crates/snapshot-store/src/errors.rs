use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SnapErrKind {
    #[error("snapshot store disabled")]
    Disabled,
    #[error("incomplete run: {executed} of {expected} steps executed")]
    Incomplete { executed: usize, expected: usize },
    #[error("invalid snapshot key: {0}")]
    InvalidKey(String),
    #[error("io failure: {0}")]
    IoFailed(String),
    #[error("snapshot not found")]
    NotFound,
    #[error("snapshot corrupt: {0}")]
    Corrupt(String),
    #[error("snapshot store read-only")]
    ReadOnly,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(transparent)]
pub struct SnapError(pub SnapErrKind);

impl SnapError {
    pub fn new(kind: SnapErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &SnapErrKind {
        &self.0
    }

    /// Refusals that leave the stored snapshot untouched and are expected
    /// in normal operation
    pub fn is_refusal(&self) -> bool {
        matches!(
            self.0,
            SnapErrKind::Disabled | SnapErrKind::Incomplete { .. } | SnapErrKind::ReadOnly
        )
    }
}

impl From<SnapErrKind> for SnapError {
    fn from(kind: SnapErrKind) -> Self {
        SnapError(kind)
    }
}

impl From<std::io::Error> for SnapError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => SnapErrKind::Corrupt(err.to_string()).into(),
            _ => SnapErrKind::IoFailed(err.to_string()).into(),
        }
    }
}

pub type SnapResult<T> = Result<T, SnapError>;
