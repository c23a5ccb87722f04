//! `Observer`: the ambient hook external integrations attach to (SPEC_FULL
//! §1 addendum). A metrics/tracing *exporter* is out of scope (spec §1),
//! but the runner still needs somewhere to emit structured events from —
//! `workflow-core` ships a `TracingObserver` default that turns every event
//! into a `tracing` event, the way the teacher ships logging defaults for
//! its `Runtime` (see `runtime.rs`) rather than no instrumentation at all.

use crate::events::WorkflowEvent;

/// Receives every [`WorkflowEvent`] in addition to the caller's stream
/// (spec §6 configuration: `observer: Observer | nil`).
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

/// Default `Observer` that logs each event via `tracing` at a level
/// appropriate to its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::ExecutorFailed { executor_id, error } => {
                tracing::warn!(executor_id, error, "executor failed");
            }
            WorkflowEvent::WorkflowFailed { error } => {
                tracing::error!(error, "workflow failed");
            }
            WorkflowEvent::ExecutorInvoked {
                executor_id,
                message_type,
            } => {
                tracing::debug!(executor_id, message_type, "executor invoked");
            }
            WorkflowEvent::ExecutorCompleted {
                executor_id,
                duration_ms,
            } => {
                tracing::debug!(executor_id, duration_ms, "executor completed");
            }
            WorkflowEvent::SuperStepStarted { index } => {
                tracing::info!(index, "superstep started");
            }
            WorkflowEvent::SuperStepCompleted { index } => {
                tracing::info!(index, "superstep completed");
            }
            WorkflowEvent::WorkflowOutput { .. } => {
                tracing::debug!("workflow output yielded");
            }
            WorkflowEvent::RequestInfo { request_id, source_id, .. } => {
                tracing::info!(request_id, source_id, "request-info raised");
            }
            WorkflowEvent::WorkflowCompleted => {
                tracing::info!("workflow completed");
            }
        }
    }
}
