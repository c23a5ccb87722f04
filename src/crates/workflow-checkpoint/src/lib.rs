//! Checkpoint persistence for `workflow-core`: a store abstraction over
//! [`WorkflowCheckpoint`] snapshots, plus in-memory and file-backed
//! implementations, per spec §4.9.
//!
//! This crate knows nothing about executors, edges, or supersteps — it only
//! knows how to durably save and load the opaque state `workflow-core`
//! hands it at a superstep boundary. That split mirrors the teacher's
//! `langgraph-checkpoint` crate sitting underneath `langgraph-core`.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{CheckpointError, Result};
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use traits::CheckpointStore;
pub use types::{PendingMessage, PendingRequest, WorkflowCheckpoint, SCHEMA_VERSION};
