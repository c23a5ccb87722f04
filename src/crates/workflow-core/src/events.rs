//! The public event stream schema (spec §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event in the stream produced by `Workflow::run`/`Workflow::resume`
/// (spec §6). `Observer` (see [`crate::observer`]) receives every event in
/// addition to whatever the caller's stream consumer sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkflowEvent {
    ExecutorInvoked {
        executor_id: String,
        message_type: String,
    },
    ExecutorCompleted {
        executor_id: String,
        duration_ms: u64,
    },
    ExecutorFailed {
        executor_id: String,
        error: String,
    },
    SuperStepStarted {
        index: u64,
    },
    SuperStepCompleted {
        index: u64,
    },
    WorkflowOutput {
        value: Value,
    },
    RequestInfo {
        request_id: String,
        source_id: String,
        payload: Value,
        response_type: String,
    },
    WorkflowCompleted,
    WorkflowFailed {
        error: String,
    },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::ExecutorInvoked { .. } => "executor-invoked",
            WorkflowEvent::ExecutorCompleted { .. } => "executor-completed",
            WorkflowEvent::ExecutorFailed { .. } => "executor-failed",
            WorkflowEvent::SuperStepStarted { .. } => "superstep-started",
            WorkflowEvent::SuperStepCompleted { .. } => "superstep-completed",
            WorkflowEvent::WorkflowOutput { .. } => "workflow-output",
            WorkflowEvent::RequestInfo { .. } => "request-info",
            WorkflowEvent::WorkflowCompleted => "workflow-completed",
            WorkflowEvent::WorkflowFailed { .. } => "workflow-failed",
        }
    }
}
