//! Shared error-context helper used across the workspace's ambient code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UtilsError>;

/// Errors from ambient helpers (retry, logging init) that don't belong to
/// any one of `WorkflowError`'s runtime taxonomy in `workflow-core`.
#[derive(Debug, Error)]
pub enum UtilsError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for UtilsError {
    fn from(err: serde_json::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}

/// Attaches a short operation label to a lower-level error, the way the
/// teacher's `tooling::error::context` wraps I/O/storage errors with the
/// name of the call site that failed.
pub trait ErrorContext<T> {
    fn context(self, label: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, label: &str) -> Result<T> {
        self.map_err(|e| UtilsError::Other(format!("{label}: {e}")))
    }
}
