//! Durable representation of runner state at a superstep boundary.
//!
//! Mirrors spec §3's `WorkflowCheckpoint`/`RequestInfoEntry` and §6's
//! on-disk JSON schema exactly; `workflow-core` owns the live, type-erased
//! message/executor representations and only crosses into these shapes at
//! the checkpoint boundary, the same split the teacher draws between
//! `Checkpoint` (this crate) and `StateGraph`'s live channel values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current on-disk schema version. Bump and handle migration explicitly if
/// the checkpoint shape ever changes; readers reject anything else.
pub const SCHEMA_VERSION: u32 = 1;

/// A message that was in-flight (enqueued, not yet delivered) when the
/// checkpoint was taken. Payloads are opaque `serde_json::Value`s here;
/// `workflow-core` is responsible for re-hydrating them into typed,
/// type-erased envelopes on resume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingMessage {
    pub source: String,
    pub target: Option<String>,
    pub payload_type: String,
    pub payload: serde_json::Value,
}

/// A still-unanswered request-info entry, per spec §3 `RequestInfoEntry`.
/// `payload`/`payload_type` describe the *prompt* passed to `request_info`
/// (e.g. `ApprovalRequest`); `response_type` is a separate tag naming the
/// shape a later `SendResponses` call must supply (e.g.
/// `ApprovalResponse`) — the two are distinct payload types, not a codec
/// and its inverse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRequest {
    pub request_id: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub payload_type: String,
    pub response_type: String,
}

/// One superstep's worth of durable runner state, per spec §3/§6.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowCheckpoint {
    pub schema_version: u32,
    pub run_id: String,
    pub superstep_index: u64,
    pub pending_messages: Vec<PendingMessage>,
    /// Opaque, base64-free here: `serde_json` already round-trips bytes as
    /// strings when the executor's `SaveState` output is itself JSON; when
    /// an executor's state is raw bytes, `workflow-core` base64-encodes it
    /// before inserting, matching the wire format in spec §6 verbatim.
    pub executor_states: HashMap<String, String>,
    pub pending_requests: Vec<PendingRequest>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    pub fn new(run_id: impl Into<String>, superstep_index: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: run_id.into(),
            superstep_index,
            pending_messages: Vec::new(),
            executor_states: HashMap::new(),
            pending_requests: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A stable identifier used by stores that key checkpoints by string id
    /// rather than by the `(run_id, superstep_index)` pair directly.
    pub fn checkpoint_id(&self) -> String {
        format!("{}-{}", self.run_id, self.superstep_index)
    }
}
