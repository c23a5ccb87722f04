//! Error types for checkpoint persistence.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors surfaced by a [`crate::CheckpointStore`] implementation.
///
/// Every variant here maps onto spec §7's `WorkflowCheckpointException`
/// family: serialization failure, schema mismatch, and missing checkpoint
/// are all "resume is refused" conditions from the caller's perspective.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint not found: run_id={run_id} checkpoint_id={checkpoint_id}")]
    NotFound {
        run_id: String,
        checkpoint_id: String,
    },

    #[error("no checkpoints recorded for run_id={0}")]
    NoCheckpointsForRun(String),

    #[error("checkpoint schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid checkpoint: {0}")]
    Invalid(String),
}
