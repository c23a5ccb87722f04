//! [`Workflow`]: the built, immutable graph, and [`RunHandle`], the stream
//! handle `run`/`resume` return (spec §4.4, §6 public API).

use crate::builder::WorkflowBuilder;
use crate::context::RunnerContext;
use crate::edge::{EdgeGroup, EdgeRunner};
use crate::error::RequestInfoError;
use crate::events::WorkflowEvent;
use crate::executor::Executor;
use crate::message::{AnyPayload, Message, Payload, TraceContext};
use crate::observer::Observer;
use crate::registry::PayloadRegistry;
use crate::runner::{self, RunOutcome};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use workflow_checkpoint::CheckpointStore;

/// Options recognized when building a runner (spec §6 "Configuration").
#[derive(Clone)]
pub struct RunnerConfig {
    pub max_iterations: u64,
    pub checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    pub observer: Option<Arc<dyn Observer>>,
    pub payload_registry: Arc<PayloadRegistry>,
}

/// An immutable, validated graph of executors and edges (spec §3, §4.5).
/// The only way to obtain one is [`WorkflowBuilder::build`].
#[derive(Clone)]
pub struct Workflow {
    start_executor_id: String,
    executors: Arc<HashMap<String, Arc<dyn Executor>>>,
    router: Arc<EdgeRunner>,
    config: RunnerConfig,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Every registered executor's id, unordered. Used by
    /// [`crate::visualization`] to render the compiled graph.
    pub fn executor_ids(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    pub fn executor(&self, id: &str) -> Option<&Arc<dyn Executor>> {
        self.executors.get(id)
    }

    pub fn edge_groups(&self) -> &[EdgeGroup] {
        self.router.groups()
    }

    pub fn start_executor_id(&self) -> &str {
        &self.start_executor_id
    }

    pub(crate) fn new(
        start_executor_id: String,
        executors: HashMap<String, Arc<dyn Executor>>,
        edge_groups: Vec<EdgeGroup>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            start_executor_id,
            executors: Arc::new(executors),
            router: Arc::new(EdgeRunner::new(edge_groups)),
            config,
        }
    }

    /// `Workflow.Run(input)` (spec §6): delivers `input` to the start
    /// executor as its first message and begins the superstep loop at
    /// superstep 0.
    pub fn run<T: Payload>(&self, run_id: impl Into<String>, input: T) -> RunHandle {
        let run_id = run_id.into();
        let (runner_ctx, events_rx) = RunnerContext::new(run_id.clone(), self.config.observer.clone());
        let runner_ctx = Arc::new(runner_ctx);

        let trace_ctx = TraceContext::root(run_id);
        let message = Message::new(self.start_executor_id.clone(), input, trace_ctx)
            .with_target(self.start_executor_id.clone());
        runner_ctx.enqueue(message);

        self.spawn_loop(runner_ctx, events_rx, 0)
    }

    /// `Workflow.Resume(run_id, checkpoint_id?)` (spec §4.9, §6): loads the
    /// latest (or named) checkpoint, restores executor state and in-flight
    /// messages/requests, and continues from `superstep_index + 1`.
    pub async fn resume(
        &self,
        run_id: impl Into<String>,
        checkpoint_id: Option<&str>,
    ) -> Result<RunHandle, ResumeWorkflowError> {
        let run_id = run_id.into();
        let store = self
            .config
            .checkpoint_store
            .clone()
            .ok_or(ResumeWorkflowError::NoCheckpointStoreConfigured)?;
        let checkpoint = store.load(&run_id, checkpoint_id).await?;

        let (runner_ctx, events_rx) = RunnerContext::new(run_id, self.config.observer.clone());
        let runner_ctx = Arc::new(runner_ctx);

        runner::restore_from_checkpoint(
            &checkpoint,
            &runner_ctx,
            &self.executors,
            &self.config.payload_registry,
        )
        .await?;

        let start_superstep = checkpoint.superstep_index + 1;
        Ok(self.spawn_loop(runner_ctx, events_rx, start_superstep))
    }

    fn spawn_loop(
        &self,
        runner_ctx: Arc<RunnerContext>,
        events_rx: mpsc::UnboundedReceiver<WorkflowEvent>,
        start_superstep: u64,
    ) -> RunHandle {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let join = tokio::spawn(runner::run_superstep_loop(
            runner_ctx.run_id().to_string(),
            Arc::clone(&self.executors),
            Arc::clone(&self.router),
            Arc::clone(&runner_ctx),
            self.config.max_iterations,
            self.config.checkpoint_store.clone(),
            Arc::clone(&cancel_flag),
            start_superstep,
        ));

        RunHandle {
            events: UnboundedReceiverStream::new(events_rx),
            runner_ctx,
            join: Some(join),
            cancel_flag,
        }
    }
}

/// Errors from [`Workflow::resume`] (spec §4.9). Distinct from
/// [`crate::error::WorkflowError`], which covers `build()`-time failures
/// only.
#[derive(Debug, thiserror::Error)]
pub enum ResumeWorkflowError {
    #[error("no checkpoint store configured for this workflow")]
    NoCheckpointStoreConfigured,
    #[error(transparent)]
    Checkpoint(#[from] workflow_checkpoint::CheckpointError),
    #[error(transparent)]
    Resume(#[from] runner::ResumeError),
}

/// A running (or completed) workflow: a [`Stream`] of [`WorkflowEvent`]s
/// plus the `SendResponses`/cancellation surface (spec §6).
pub struct RunHandle {
    events: UnboundedReceiverStream<WorkflowEvent>,
    runner_ctx: Arc<RunnerContext>,
    join: Option<JoinHandle<RunOutcome>>,
    cancel_flag: Arc<AtomicBool>,
}

impl RunHandle {
    /// Injects a single typed response for `request_id` (spec §4.6
    /// `RequestInfo`'s resumption half).
    pub fn send_response<T: Payload>(&self, request_id: &str, payload: T) -> Result<(), RequestInfoError> {
        self.runner_ctx.inject_response(request_id, Arc::new(payload))
    }

    /// `Workflow.SendResponses(map<request_id, payload>)` (spec §6) for
    /// already type-erased payloads. Returns the `(request_id, error)` pairs
    /// for any entries that didn't match a pending request; valid entries
    /// are still applied.
    pub fn send_responses(
        &self,
        responses: HashMap<String, Arc<dyn AnyPayload>>,
    ) -> Vec<(String, RequestInfoError)> {
        let mut errors = Vec::new();
        for (request_id, payload) in responses {
            if let Err(err) = self.runner_ctx.inject_response(&request_id, payload) {
                errors.push((request_id, err));
            }
        }
        errors
    }

    /// Requests cancellation (spec §5): the runner stops before the next
    /// superstep's handlers are invoked; anything already running completes.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Awaits the run's terminal outcome. `None` if already awaited.
    pub async fn join(&mut self) -> Option<RunOutcome> {
        let handle = self.join.take()?;
        handle.await.ok()
    }

    pub fn run_id(&self) -> &str {
        self.runner_ctx.run_id()
    }
}

impl Stream for RunHandle {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
