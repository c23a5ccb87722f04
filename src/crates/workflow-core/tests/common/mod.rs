//! Shared fixtures for the scenario tests in this directory: a handful of
//! minimal payload types and executors standing in for the "real" nodes an
//! application would register (LLM calls, tool invocations, human review
//! queues), so each scenario test can focus on graph wiring and runner
//! semantics rather than on what any one node actually computes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use workflow_core::{AnyPayload, Executor, ExecutorError, ExecutorResult, Message, Payload, PayloadType, WorkflowContext};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPayload {
    pub value: String,
}

impl Payload for TextPayload {
    const TYPE_TAG: &'static str = "support_text";
}

impl TextPayload {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    pub question: String,
}

impl Payload for ApprovalRequest {
    const TYPE_TAG: &'static str = "support_approval_request";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalResponse {
    pub approved: bool,
}

impl Payload for ApprovalResponse {
    const TYPE_TAG: &'static str = "support_approval_response";
}

/// Appends `suffix` to an incoming [`TextPayload`] and routes the result to
/// whatever edge group is registered for this executor's id. Plays the role
/// of every intermediate node in the pipeline/fan-out/switch scenarios.
pub struct AppendExecutor {
    id: String,
    suffix: String,
}

impl AppendExecutor {
    pub fn new(id: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { id: id.into(), suffix: suffix.into() }
    }
}

#[async_trait]
impl Executor for AppendExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let input: TextPayload = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        ctx.send_message(TextPayload::new(format!("{}{}", input.value, self.suffix)), None);
        Ok(())
    }
}

/// Forwards its input unchanged. Used as the self-looping node in the
/// iteration-cap test and as a structurally-reachable-but-never-invoked
/// placeholder where a test only cares that an executor id resolves.
pub struct RelayExecutor {
    id: String,
}

impl RelayExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for RelayExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let input: TextPayload = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        ctx.send_message(input, None);
        Ok(())
    }
}

/// Counts every message it handles and forwards it onward. Its `save_state`
/// / `restore_state` pair makes it useful for checkpoint round-trip tests.
pub struct CounterExecutor {
    id: String,
    counter: AtomicU64,
}

impl CounterExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), counter: AtomicU64::new(0) }
    }

    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for CounterExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let input: TextPayload = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        self.counter.fetch_add(1, Ordering::SeqCst);
        ctx.send_message(input, None);
        Ok(())
    }

    fn save_state(&self) -> ExecutorResult<Vec<u8>> {
        Ok(self.counter.load(Ordering::SeqCst).to_le_bytes().to_vec())
    }

    fn restore_state(&self, bytes: &[u8]) -> ExecutorResult<()> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| ExecutorError::new("malformed counter state"))?;
        self.counter.store(u64::from_le_bytes(array), Ordering::SeqCst);
        Ok(())
    }
}

/// Terminal node: yields its input as workflow output instead of forwarding
/// it, ending a pipeline/fan-out/switch-case scenario.
pub struct SinkExecutor {
    id: String,
}

impl SinkExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for SinkExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let input: TextPayload = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        ctx.yield_output(serde_json::json!({ "value": input.value, "from": self.id }));
        Ok(())
    }
}

/// Terminal node for `FanIn` scenarios: yields the aggregated batch's items
/// as workflow output.
pub struct FanInSinkExecutor {
    id: String,
}

impl FanInSinkExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for FanInSinkExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![workflow_core::FanInBatch::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let batch: workflow_core::FanInBatch = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        ctx.yield_output(serde_json::json!({ "items": batch.items }));
        Ok(())
    }
}

/// Requests human approval for its input via `RequestInfo`, then yields
/// whatever the injected [`ApprovalResponse`] said once it arrives (spec
/// §4.6's request/response interrupt pattern).
pub struct ApprovalGateExecutor {
    id: String,
}

impl ApprovalGateExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for ApprovalGateExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![TextPayload::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    fn response_types(&self) -> Vec<PayloadType> {
        vec![ApprovalResponse::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let input: TextPayload = message
            .downcast()
            .ok_or_else(|| ExecutorError::new(format!("unhandled-message-type: '{}'", message.payload_type)))?;
        ctx.request_info(
            ApprovalRequest { question: format!("approve '{}'?", input.value) },
            ApprovalResponse::payload_type(),
        );
        Ok(())
    }

    async fn handle_response(
        &self,
        _request_id: String,
        response: Arc<dyn AnyPayload>,
        ctx: WorkflowContext,
    ) -> ExecutorResult<()> {
        let response: ApprovalResponse = workflow_core::downcast_payload(&response)
            .ok_or_else(|| ExecutorError::new("unexpected response payload type"))?;
        ctx.yield_output(serde_json::json!({ "approved": response.approved }));
        Ok(())
    }
}
