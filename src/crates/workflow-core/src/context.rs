//! [`RunnerContext`] (the in-process mailbox, spec §4.1) and
//! [`WorkflowContext`] (the per-handler capability, spec §4.6).

use crate::edge::EdgeRunner;
use crate::error::RequestInfoError;
use crate::events::WorkflowEvent;
use crate::message::{AnyPayload, Message, Payload, PayloadType, TraceContext};
use crate::observer::Observer;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use uuid::Uuid;

/// A still-unanswered request-info entry (spec §3 `RequestInfoEntry`).
#[derive(Clone)]
pub struct RequestInfoEntry {
    pub request_id: String,
    pub source_executor_id: String,
    pub payload: Arc<dyn AnyPayload>,
    pub expected_response_type: PayloadType,
}

/// A response ready to be delivered to the executor that registered the
/// matching request (spec §4.1 `TakeReadyResponses`).
pub struct ResponseDelivery {
    pub request_id: String,
    pub source_executor_id: String,
    pub response_type: PayloadType,
    pub payload: Arc<dyn AnyPayload>,
}

/// Process-local mailbox: pending messages, events, shared state, and the
/// request/response correlation table (spec §4.1).
pub struct RunnerContext {
    run_id: String,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: AsyncMutex<mpsc::UnboundedReceiver<Message>>,
    outbox_tx: mpsc::UnboundedSender<WorkflowEvent>,
    shared_state: DashMap<String, serde_json::Value>,
    pending_requests: DashMap<String, RequestInfoEntry>,
    pending_responses: DashMap<String, Arc<dyn AnyPayload>>,
    observer: Option<Arc<dyn Observer>>,
    output_produced: AtomicBool,
}

impl RunnerContext {
    pub fn new(run_id: impl Into<String>, observer: Option<Arc<dyn Observer>>) -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        (
            Self {
                run_id: run_id.into(),
                inbox_tx,
                inbox_rx: AsyncMutex::new(inbox_rx),
                outbox_tx,
                shared_state: DashMap::new(),
                pending_requests: DashMap::new(),
                pending_responses: DashMap::new(),
                observer,
                output_produced: AtomicBool::new(false),
            },
            outbox_rx,
        )
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Enqueues `msg` for delivery in a future superstep. Never delivered
    /// within the superstep it was produced in (spec §5 ordering
    /// guarantee) because `drain_ready_for_superstep` only sees messages
    /// already sitting in the channel at the moment it's called.
    pub fn enqueue(&self, msg: Message) {
        // An unbounded channel's only failure mode is a dropped receiver,
        // which only happens after the run has fully torn down.
        let _ = self.inbox_tx.send(msg);
    }

    /// Drains every message currently buffered in the inbox. Messages sent
    /// by handlers invoked as part of *this* call's resulting superstep
    /// land back in the channel and are picked up by the next call.
    pub async fn drain_ready_for_superstep(&self) -> Vec<Message> {
        let mut rx = self.inbox_rx.lock().await;
        let mut ready = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            ready.push(msg);
        }
        ready
    }

    /// `true` iff the inbox currently has no buffered messages, used by the
    /// runner's termination check (spec §4.4 step 6). Implemented by
    /// peeking the channel with `try_recv`/re-send rather than relying on
    /// a receiver-side length query, since that round-trip is cheap and
    /// keeps this independent of a specific `tokio` version's receiver API.
    pub async fn inbox_is_empty(&self) -> bool {
        let mut rx = self.inbox_rx.lock().await;
        match rx.try_recv() {
            Ok(msg) => {
                let _ = self.inbox_tx.send(msg);
                false
            }
            Err(_) => true,
        }
    }

    pub fn emit_event(&self, event: WorkflowEvent) {
        if matches!(event, WorkflowEvent::WorkflowOutput { .. }) {
            self.output_produced.store(true, Ordering::Relaxed);
        }
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
        let _ = self.outbox_tx.send(event);
    }

    /// Whether a `WorkflowOutputEvent` has ever been yielded on this run,
    /// used by the runner to decide whether exceeding `max_iterations` is
    /// a fatal condition (spec §4.4, §7).
    pub fn has_produced_output(&self) -> bool {
        self.output_produced.load(Ordering::Relaxed)
    }

    /// Non-destructively reads every message currently buffered in the
    /// inbox, for checkpoint serialization (spec §4.9 `pending_messages`).
    /// Implemented as drain-then-resend since the channel only exposes a
    /// consuming receive.
    pub async fn peek_pending_messages(&self) -> Vec<Message> {
        let mut rx = self.inbox_rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
        for msg in &drained {
            let _ = self.inbox_tx.send(msg.clone());
        }
        drained
    }

    /// Snapshot of every still-unanswered request-info entry, for
    /// checkpoint serialization (spec §4.9 `pending_requests`).
    pub fn pending_requests_snapshot(&self) -> Vec<RequestInfoEntry> {
        self.pending_requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Registers a request-info entry and returns its generated id (spec
    /// §4.6 `RequestInfo`).
    pub fn register_request(
        &self,
        source_executor_id: impl Into<String>,
        payload: Arc<dyn AnyPayload>,
        expected_response_type: PayloadType,
    ) -> String {
        let request_id = Uuid::new_v4().to_string();
        self.pending_requests.insert(
            request_id.clone(),
            RequestInfoEntry {
                request_id: request_id.clone(),
                source_executor_id: source_executor_id.into(),
                payload,
                expected_response_type,
            },
        );
        request_id
    }

    /// Injects an externally-provided response for `request_id`. Idempotent
    /// in the sense that a second injection for the same id is rejected
    /// rather than silently overwriting the first (spec §4.1).
    pub fn inject_response(
        &self,
        request_id: &str,
        payload: Arc<dyn AnyPayload>,
    ) -> Result<(), RequestInfoError> {
        if !self.pending_requests.contains_key(request_id) {
            return Err(RequestInfoError::UnknownRequest(request_id.to_string()));
        }
        if self.pending_responses.contains_key(request_id) {
            return Err(RequestInfoError::AlreadyResponded(request_id.to_string()));
        }
        self.pending_responses.insert(request_id.to_string(), payload);
        Ok(())
    }

    /// Takes every request whose response has arrived, removing both the
    /// request and response entries (spec §4.1 `TakeReadyResponses`).
    pub fn take_ready_responses(&self) -> Vec<ResponseDelivery> {
        let ready_ids: Vec<String> = self
            .pending_responses
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut deliveries = Vec::new();
        for request_id in ready_ids {
            let Some((_, payload)) = self.pending_responses.remove(&request_id) else {
                continue;
            };
            let Some((_, entry)) = self.pending_requests.remove(&request_id) else {
                continue;
            };
            deliveries.push(ResponseDelivery {
                request_id,
                source_executor_id: entry.source_executor_id,
                response_type: entry.expected_response_type,
                payload,
            });
        }
        deliveries
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.pending_requests.is_empty()
    }

    /// Re-populates a request-info entry read back from a checkpoint
    /// (spec §4.9 resume: "repopulates ... the request-info table").
    pub fn restore_pending_request(&self, entry: RequestInfoEntry) {
        self.pending_requests.insert(entry.request_id.clone(), entry);
    }

    pub fn shared_state_get(&self, key: &str) -> Option<serde_json::Value> {
        self.shared_state.get(key).map(|v| v.clone())
    }

    pub fn shared_state_set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.shared_state.insert(key.into(), value);
    }

    pub fn shared_state_snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        self.shared_state
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// The capability object passed to every handler (spec §4.6).
#[derive(Clone)]
pub struct WorkflowContext {
    executor_id: String,
    source_executor_id: String,
    is_streaming: bool,
    trace_ctx: TraceContext,
    runner_ctx: Arc<RunnerContext>,
    router: Arc<EdgeRunner>,
}

impl WorkflowContext {
    pub fn new(
        executor_id: impl Into<String>,
        source_executor_id: impl Into<String>,
        is_streaming: bool,
        trace_ctx: TraceContext,
        runner_ctx: Arc<RunnerContext>,
        router: Arc<EdgeRunner>,
    ) -> Self {
        Self {
            executor_id: executor_id.into(),
            source_executor_id: source_executor_id.into(),
            is_streaming,
            trace_ctx,
            runner_ctx,
            router,
        }
    }

    /// Sends `payload` either to every matching edge (`target = None`) or
    /// directly to `target`, provided an edge connects the two (spec
    /// §4.6).
    pub fn send_message<T: Payload>(&self, payload: T, target: Option<&str>) {
        let message = Message::new(self.executor_id.clone(), payload, self.trace_ctx.clone());
        match target {
            None => self.router.route(message, &self.runner_ctx),
            Some(target) => self.router.route_direct(message, target, &self.runner_ctx),
        }
    }

    /// Emits a workflow-visible output without terminating the workflow
    /// (spec §4.6).
    pub fn yield_output(&self, value: serde_json::Value) {
        self.runner_ctx.emit_event(WorkflowEvent::WorkflowOutput { value });
    }

    /// Emits a raw event onto this run's event stream. Used by the
    /// sub-workflow executor to forward a (tagged) embedded workflow's
    /// events into the parent's stream (spec §4.10).
    pub fn emit_event(&self, event: WorkflowEvent) {
        self.runner_ctx.emit_event(event);
    }

    /// Registers a request-info entry and raises a `RequestInfoEvent`. The
    /// handler returns immediately after calling this; the framework
    /// resumes via `Executor::handle_response` once a matching response is
    /// injected (spec §4.6, §9 "no coroutine rescheduling primitives are
    /// required").
    pub fn request_info<T: Payload>(&self, prompt_payload: T, response_type: PayloadType) -> String {
        let json = prompt_payload.to_json();
        let request_id = self.runner_ctx.register_request(
            self.executor_id.clone(),
            Arc::new(prompt_payload),
            response_type.clone(),
        );
        self.runner_ctx.emit_event(WorkflowEvent::RequestInfo {
            request_id: request_id.clone(),
            source_id: self.executor_id.clone(),
            payload: json,
            response_type: response_type.to_string(),
        });
        request_id
    }

    pub fn get_source_executor_id(&self) -> &str {
        &self.source_executor_id
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    pub fn shared_state(&self) -> SharedStateHandle<'_> {
        SharedStateHandle { runner_ctx: &self.runner_ctx }
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn trace_ctx(&self) -> &TraceContext {
        &self.trace_ctx
    }
}

/// Thin read/write view over `RunnerContext`'s free-form shared state map
/// (spec §3, §4.6 `SharedState`). Last-writer-wins within a superstep;
/// there is no lock exposed to callers.
pub struct SharedStateHandle<'a> {
    runner_ctx: &'a RunnerContext,
}

impl SharedStateHandle<'_> {
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.runner_ctx.shared_state_get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.runner_ctx.shared_state_set(key, value);
    }

    pub fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        self.runner_ctx.shared_state_snapshot()
    }
}
