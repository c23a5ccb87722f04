//! The superstep loop (spec §4.4): drains whatever is ready, fires one
//! concurrent task per target executor, routes what comes out, checkpoints,
//! and decides whether to keep going.

use crate::context::{ResponseDelivery, RunnerContext, WorkflowContext};
use crate::edge::EdgeRunner;
use crate::error::FatalReason;
use crate::events::WorkflowEvent;
use crate::executor::{Executor, ExecutorError};
use crate::message::Message;
use crate::registry::PayloadRegistry;
use base64::Engine;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use workflow_checkpoint::{CheckpointStore, PendingMessage, PendingRequest, WorkflowCheckpoint};

/// How long the loop sleeps between idle ticks while waiting on an
/// unanswered `RequestInfo` with nothing else ready (spec §4.4 step 6: this
/// is a wait, not a superstep, so it doesn't advance `index` or count
/// against `max_iterations`).
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub enum RunOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

enum Invocation {
    Message(Message),
    Response(ResponseDelivery),
}

/// Drives `runner_ctx` from `start_superstep` until the workflow completes,
/// fails fatally, or `cancel_flag` is observed (spec §5 cancellation: "the
/// runner stops the next superstep before invoking handlers; in-flight
/// handlers are allowed to complete").
#[allow(clippy::too_many_arguments)]
pub async fn run_superstep_loop(
    run_id: String,
    executors: Arc<HashMap<String, Arc<dyn Executor>>>,
    router: Arc<EdgeRunner>,
    runner_ctx: Arc<RunnerContext>,
    max_iterations: u64,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    cancel_flag: Arc<AtomicBool>,
    start_superstep: u64,
) -> RunOutcome {
    let mut index = start_superstep;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            return RunOutcome::Cancelled;
        }

        let ready = runner_ctx.drain_ready_for_superstep().await;
        let responses = runner_ctx.take_ready_responses();

        if ready.is_empty() && responses.is_empty() {
            if !runner_ctx.has_pending_requests() {
                runner_ctx.emit_event(WorkflowEvent::WorkflowCompleted);
                return RunOutcome::Completed;
            }
            // Waiting on external input via SendResponses; not a superstep.
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            continue;
        }

        runner_ctx.emit_event(WorkflowEvent::SuperStepStarted { index });

        let mut by_target: HashMap<String, Vec<Invocation>> = HashMap::new();
        for msg in ready {
            let Some(target) = msg.target_executor_id.clone() else {
                continue;
            };
            by_target.entry(target).or_default().push(Invocation::Message(msg));
        }
        for response in responses {
            by_target
                .entry(response.source_executor_id.clone())
                .or_default()
                .push(Invocation::Response(response));
        }

        let mut tasks = Vec::with_capacity(by_target.len());
        for (target_id, invocations) in by_target {
            let Some(executor) = executors.get(&target_id).cloned() else {
                tracing::warn!(target_id, "message routed to unregistered executor, dropping");
                continue;
            };
            let runner_ctx = Arc::clone(&runner_ctx);
            let router = Arc::clone(&router);
            tasks.push(tokio::spawn(run_invocations_for_target(
                target_id,
                executor,
                invocations,
                runner_ctx,
                router,
            )));
        }

        let results = join_all(tasks).await;
        let mut fatal_reason: Option<FatalReason> = None;
        for joined in results {
            if let Ok(Some(reason)) = joined {
                fatal_reason.get_or_insert(reason);
            }
        }

        if let Some(reason) = fatal_reason {
            runner_ctx.emit_event(WorkflowEvent::WorkflowFailed {
                error: reason.to_string(),
            });
            return RunOutcome::Failed(reason.to_string());
        }

        runner_ctx.emit_event(WorkflowEvent::SuperStepCompleted { index });

        if let Some(store) = &checkpoint_store {
            match build_checkpoint(&run_id, index, &runner_ctx, &executors).await {
                Ok(checkpoint) => {
                    if let Err(err) = store.save(checkpoint).await {
                        tracing::warn!(error = %err, "failed to persist checkpoint");
                    }
                }
                Err(err) => tracing::warn!(error = %err, "failed to build checkpoint"),
            }
        }

        index += 1;
        if index > max_iterations {
            if runner_ctx.has_produced_output() {
                runner_ctx.emit_event(WorkflowEvent::WorkflowCompleted);
                return RunOutcome::Completed;
            }
            let reason = FatalReason::MaxIterationsExceeded { max_iterations };
            runner_ctx.emit_event(WorkflowEvent::WorkflowFailed {
                error: reason.to_string(),
            });
            return RunOutcome::Failed(reason.to_string());
        }
    }
}

/// Runs every invocation addressed to one executor strictly sequentially
/// (spec §5: "handlers for the same executor run sequentially"), while
/// different executors' tasks run concurrently via the caller's
/// `tokio::spawn`.
async fn run_invocations_for_target(
    target_id: String,
    executor: Arc<dyn Executor>,
    invocations: Vec<Invocation>,
    runner_ctx: Arc<RunnerContext>,
    router: Arc<EdgeRunner>,
) -> Option<FatalReason> {
    let mut fatal = None;
    for invocation in invocations {
        let (started, result) = match invocation {
            Invocation::Message(msg) => {
                let ctx = WorkflowContext::new(
                    target_id.clone(),
                    msg.source_executor_id.clone(),
                    false,
                    msg.trace_ctx.clone(),
                    Arc::clone(&runner_ctx),
                    Arc::clone(&router),
                );
                runner_ctx.emit_event(WorkflowEvent::ExecutorInvoked {
                    executor_id: target_id.clone(),
                    message_type: msg.payload_type.to_string(),
                });
                let started = Instant::now();
                (started, executor.handle(msg, ctx).await)
            }
            Invocation::Response(response) => {
                let ctx = WorkflowContext::new(
                    target_id.clone(),
                    response.source_executor_id.clone(),
                    false,
                    crate::message::TraceContext::root(runner_ctx.run_id().to_string()),
                    Arc::clone(&runner_ctx),
                    Arc::clone(&router),
                );
                runner_ctx.emit_event(WorkflowEvent::ExecutorInvoked {
                    executor_id: target_id.clone(),
                    message_type: response.response_type.to_string(),
                });
                let started = Instant::now();
                let result = executor.handle_response(response.request_id, response.payload, ctx).await;
                (started, result)
            }
        };
        record_outcome(&runner_ctx, &target_id, started, result, &mut fatal);
        if fatal.is_some() {
            break;
        }
    }
    fatal
}

fn record_outcome(
    runner_ctx: &RunnerContext,
    executor_id: &str,
    started: Instant,
    result: Result<(), ExecutorError>,
    fatal: &mut Option<FatalReason>,
) {
    match result {
        Ok(()) => {
            runner_ctx.emit_event(WorkflowEvent::ExecutorCompleted {
                executor_id: executor_id.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        Err(err) => {
            runner_ctx.emit_event(WorkflowEvent::ExecutorFailed {
                executor_id: executor_id.to_string(),
                error: err.message.clone(),
            });
            if err.terminate_workflow {
                *fatal = Some(FatalReason::HandlerRequested(err.message));
            }
        }
    }
}

/// Captures the current runner state into a [`WorkflowCheckpoint`] (spec
/// §4.9). Executor state is base64-encoded because `SaveState` returns raw
/// bytes, matching the wire format in spec §6.
async fn build_checkpoint(
    run_id: &str,
    superstep_index: u64,
    runner_ctx: &RunnerContext,
    executors: &HashMap<String, Arc<dyn Executor>>,
) -> Result<WorkflowCheckpoint, ExecutorError> {
    let mut checkpoint = WorkflowCheckpoint::new(run_id.to_string(), superstep_index);

    for msg in runner_ctx.peek_pending_messages().await {
        checkpoint.pending_messages.push(PendingMessage {
            source: msg.source_executor_id.clone(),
            target: msg.target_executor_id.clone(),
            payload_type: msg.payload_type.to_string(),
            payload: msg.payload.to_json(),
        });
    }

    for entry in runner_ctx.pending_requests_snapshot() {
        checkpoint.pending_requests.push(PendingRequest {
            request_id: entry.request_id,
            source: entry.source_executor_id,
            payload_type: entry.payload.payload_type().to_string(),
            payload: entry.payload.to_json(),
            response_type: entry.expected_response_type.to_string(),
        });
    }

    for (id, executor) in executors.iter() {
        let bytes = executor.save_state()?;
        if !bytes.is_empty() {
            checkpoint
                .executor_states
                .insert(id.clone(), base64::engine::general_purpose::STANDARD.encode(bytes));
        }
    }

    Ok(checkpoint)
}

/// Re-seeds `runner_ctx` and every executor from a loaded checkpoint (spec
/// §4.9 resume), using `registry` to turn each pending message/request's
/// JSON payload back into a typed, type-erased envelope.
pub async fn restore_from_checkpoint(
    checkpoint: &WorkflowCheckpoint,
    runner_ctx: &RunnerContext,
    executors: &HashMap<String, Arc<dyn Executor>>,
    registry: &PayloadRegistry,
) -> Result<(), ResumeError> {
    for (id, encoded) in &checkpoint.executor_states {
        let Some(executor) = executors.get(id) else {
            tracing::warn!(executor_id = id, "checkpoint references unknown executor, skipping");
            continue;
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ResumeError::ExecutorRestore(id.clone(), e.to_string()))?;
        executor
            .restore_state(&bytes)
            .map_err(|e| ResumeError::ExecutorRestore(id.clone(), e.to_string()))?;
    }

    for pending in &checkpoint.pending_messages {
        let payload_type = crate::message::PayloadType::new(pending.payload_type.clone());
        let Some(payload) = registry.deserialize(&payload_type, pending.payload.clone()) else {
            tracing::warn!(
                payload_type = pending.payload_type.as_str(),
                "no registered codec for pending message, dropping on resume"
            );
            continue;
        };
        let trace_ctx = crate::message::TraceContext::root(checkpoint.run_id.clone());
        let message = Message {
            id: uuid::Uuid::new_v4(),
            source_executor_id: pending.source.clone(),
            target_executor_id: pending.target.clone(),
            payload,
            payload_type,
            trace_ctx,
        };
        runner_ctx.enqueue(message);
    }

    for pending in &checkpoint.pending_requests {
        let payload_type = crate::message::PayloadType::new(pending.payload_type.clone());
        let Some(payload) = registry.deserialize(&payload_type, pending.payload.clone()) else {
            tracing::warn!(
                payload_type = pending.payload_type.as_str(),
                "no registered codec for pending request's prompt payload, dropping on resume"
            );
            continue;
        };
        let expected_response_type = crate::message::PayloadType::new(pending.response_type.clone());
        runner_ctx.restore_pending_request(crate::context::RequestInfoEntry {
            request_id: pending.request_id.clone(),
            source_executor_id: pending.source.clone(),
            payload,
            expected_response_type,
        });
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("executor '{0}' failed to restore state: {1}")]
    ExecutorRestore(String, String),
}
