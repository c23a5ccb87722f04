//! File-backed [`CheckpointStore`]: one JSON file per superstep under a
//! configured directory, named `<run_id>-<superstep_index>.json` exactly as
//! spec §4.9/§6 specify. Writes are atomic via write-to-temp-then-rename,
//! the same pattern the teacher's checkpoint persistence docs describe for
//! a production backend (`lib.rs`'s "Performance Considerations" section).

use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use crate::types::{WorkflowCheckpoint, SCHEMA_VERSION};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Checkpoint store that persists each superstep's checkpoint as its own
/// JSON file in `dir`. The directory is created on first use if absent.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(run_id: &str, superstep_index: u64) -> String {
        format!("{run_id}-{superstep_index}.json")
    }

    fn path_for(&self, run_id: &str, superstep_index: u64) -> PathBuf {
        self.dir.join(Self::file_name(run_id, superstep_index))
    }

    /// Parses `<run_id>-<superstep_index>.json` back into its superstep
    /// index. Returns `None` for file names that don't match the scheme
    /// (stray files in the directory are ignored rather than erroring).
    fn superstep_from_name(run_id: &str, file_name: &str) -> Option<u64> {
        let stem = file_name.strip_suffix(".json")?;
        let suffix = stem.strip_prefix(run_id)?.strip_prefix('-')?;
        suffix.parse().ok()
    }

    async fn list_steps(&self, run_id: &str) -> Result<Vec<u64>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut steps = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(step) = Self::superstep_from_name(run_id, name) {
                    steps.push(step);
                }
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<String> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&checkpoint.run_id, checkpoint.superstep_index);
        let id = checkpoint.checkpoint_id();
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        Self::write_atomic(&path, &bytes).await?;
        debug!(run_id = %checkpoint.run_id, superstep = checkpoint.superstep_index, path = %path.display(), "checkpoint written");
        Ok(id)
    }

    async fn load(&self, run_id: &str, checkpoint_id: Option<&str>) -> Result<WorkflowCheckpoint> {
        let superstep_index = match checkpoint_id {
            Some(id) => Self::superstep_from_name(run_id, &format!("{id}.json"))
                .ok_or_else(|| CheckpointError::Invalid(format!("malformed checkpoint id: {id}")))?,
            None => *self
                .list_steps(run_id)
                .await?
                .last()
                .ok_or_else(|| CheckpointError::NoCheckpointsForRun(run_id.to_string()))?,
        };

        let path = self.path_for(run_id, superstep_index);
        let bytes = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CheckpointError::NotFound {
                    run_id: run_id.to_string(),
                    checkpoint_id: Self::file_name(run_id, superstep_index),
                }
            } else {
                CheckpointError::Io(e)
            }
        })?;

        let checkpoint: WorkflowCheckpoint = serde_json::from_slice(&bytes)?;
        if checkpoint.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: checkpoint.schema_version,
            });
        }
        Ok(checkpoint)
    }

    async fn list(&self, run_id: &str) -> Result<Vec<String>> {
        Ok(self
            .list_steps(run_id)
            .await?
            .into_iter()
            .map(|step| Self::file_name(run_id, step).trim_end_matches(".json").to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkpoint(run_id: &str, step: u64) -> WorkflowCheckpoint {
        WorkflowCheckpoint::new(run_id, step)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let original = checkpoint("run-1", 3);
        store.save(original.clone()).await.unwrap();

        let loaded = store.load("run-1", None).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn load_latest_picks_highest_superstep() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(checkpoint("run-1", 0)).await.unwrap();
        store.save(checkpoint("run-1", 5)).await.unwrap();
        store.save(checkpoint("run-1", 2)).await.unwrap();

        let loaded = store.load("run-1", None).await.unwrap();
        assert_eq!(loaded.superstep_index, 5);
    }

    #[tokio::test]
    async fn missing_run_directory_errors() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nonexistent"));
        let err = store.load("run-1", None).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NoCheckpointsForRun(_)));
    }

    #[tokio::test]
    async fn list_returns_ids_sorted_by_superstep() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(checkpoint("run-1", 2)).await.unwrap();
        store.save(checkpoint("run-1", 0)).await.unwrap();
        store.save(checkpoint("run-1", 1)).await.unwrap();

        let ids = store.list("run-1").await.unwrap();
        assert_eq!(ids, vec!["run-1-0", "run-1-1", "run-1-2"]);
    }

    #[tokio::test]
    async fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let mut bad = checkpoint("run-1", 0);
        bad.schema_version = 99;
        let bytes = serde_json::to_vec(&bad).unwrap();
        fs::create_dir_all(dir.path()).await.unwrap();
        fs::write(dir.path().join("run-1-0.json"), bytes)
            .await
            .unwrap();

        let err = store.load("run-1", None).await.unwrap_err();
        assert!(matches!(err, CheckpointError::SchemaMismatch { .. }));
    }
}
