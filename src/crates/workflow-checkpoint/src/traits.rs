//! The [`CheckpointStore`] trait: save/load/list over [`WorkflowCheckpoint`]s.
//!
//! Grounded in the teacher's `CheckpointSaver` trait (`langgraph-checkpoint`'s
//! `traits.rs`) but narrowed to the three operations spec §4.9 actually
//! names — `Save`, `Load`, `List` — since this port's checkpoint identity is
//! the simpler `(run_id, superstep_index)` pair rather than the teacher's
//! thread/checkpoint-id/parent-config lineage model.

use crate::error::Result;
use crate::types::WorkflowCheckpoint;
use async_trait::async_trait;

/// Persists and retrieves [`WorkflowCheckpoint`]s keyed by run id.
///
/// Implementations must make `save` atomic: a reader must never observe a
/// partially written checkpoint. `workflow-core`'s runner calls `save` at
/// every superstep boundary when checkpointing is enabled (spec §4.4 step 5).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persists `checkpoint`, returning its checkpoint id (the value a
    /// caller passes back to [`CheckpointStore::load`]).
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<String>;

    /// Loads a specific checkpoint by id, or the latest checkpoint for
    /// `run_id` when `checkpoint_id` is `None`.
    async fn load(&self, run_id: &str, checkpoint_id: Option<&str>) -> Result<WorkflowCheckpoint>;

    /// Lists checkpoint ids recorded for `run_id`, oldest first.
    async fn list(&self, run_id: &str) -> Result<Vec<String>>;
}
