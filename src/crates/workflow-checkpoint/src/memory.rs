//! In-memory [`CheckpointStore`], for tests and short-lived runs.
//!
//! Grounded in the teacher's `InMemoryCheckpointSaver` (`memory.rs`): a
//! concurrent map keyed by run id holding an ordered history of
//! checkpoints. Ephemeral by construction — data is lost on process exit.

use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use crate::types::WorkflowCheckpoint;
use async_trait::async_trait;
use dashmap::DashMap;

/// Thread-safe, process-local checkpoint store backed by a `DashMap` of
/// append-only histories, one per `run_id`.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    histories: DashMap<String, Vec<WorkflowCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all recorded checkpoints. Test-only convenience, mirroring the
    /// teacher's `InMemoryCheckpointSaver::clear`.
    pub fn clear(&self) {
        self.histories.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<String> {
        let id = checkpoint.checkpoint_id();
        self.histories
            .entry(checkpoint.run_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(id)
    }

    async fn load(&self, run_id: &str, checkpoint_id: Option<&str>) -> Result<WorkflowCheckpoint> {
        let history = self
            .histories
            .get(run_id)
            .ok_or_else(|| CheckpointError::NoCheckpointsForRun(run_id.to_string()))?;

        match checkpoint_id {
            None => history
                .last()
                .cloned()
                .ok_or_else(|| CheckpointError::NoCheckpointsForRun(run_id.to_string())),
            Some(id) => history
                .iter()
                .find(|c| c.checkpoint_id() == id)
                .cloned()
                .ok_or_else(|| CheckpointError::NotFound {
                    run_id: run_id.to_string(),
                    checkpoint_id: id.to_string(),
                }),
        }
    }

    async fn list(&self, run_id: &str) -> Result<Vec<String>> {
        Ok(self
            .histories
            .get(run_id)
            .map(|history| history.iter().map(|c| c.checkpoint_id()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(run_id: &str, step: u64) -> WorkflowCheckpoint {
        WorkflowCheckpoint::new(run_id, step)
    }

    #[tokio::test]
    async fn save_then_load_latest() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("run-1", 0)).await.unwrap();
        store.save(checkpoint("run-1", 1)).await.unwrap();

        let latest = store.load("run-1", None).await.unwrap();
        assert_eq!(latest.superstep_index, 1);
    }

    #[tokio::test]
    async fn load_specific_checkpoint_id() {
        let store = InMemoryCheckpointStore::new();
        let id0 = store.save(checkpoint("run-1", 0)).await.unwrap();
        store.save(checkpoint("run-1", 1)).await.unwrap();

        let loaded = store.load("run-1", Some(&id0)).await.unwrap();
        assert_eq!(loaded.superstep_index, 0);
    }

    #[tokio::test]
    async fn unknown_run_id_errors() {
        let store = InMemoryCheckpointStore::new();
        let err = store.load("missing", None).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NoCheckpointsForRun(_)));
    }

    #[tokio::test]
    async fn list_returns_ids_in_order() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("run-1", 0)).await.unwrap();
        store.save(checkpoint("run-1", 1)).await.unwrap();
        store.save(checkpoint("run-1", 2)).await.unwrap();

        let ids = store.list("run-1").await.unwrap();
        assert_eq!(ids, vec!["run-1-0", "run-1-1", "run-1-2"]);
    }
}
