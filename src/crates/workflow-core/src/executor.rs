//! [`Executor`]: the node type of the workflow graph (spec §3, §4.2).

use crate::context::WorkflowContext;
use crate::message::{AnyPayload, Message, PayloadType};
use async_trait::async_trait;
use std::sync::Arc;

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

/// An error raised from inside a handler. `terminate_workflow` realizes
/// spec §7's "any exception explicitly tagged fatal by a handler" —
/// everything else surfaces only as an `ExecutorFailedEvent` and the
/// workflow continues (spec §4.4).
#[derive(Debug, Clone)]
pub struct ExecutorError {
    pub message: String,
    pub terminate_workflow: bool,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            terminate_workflow: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            terminate_workflow: true,
        }
    }
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExecutorError {}

impl From<String> for ExecutorError {
    fn from(message: String) -> Self {
        ExecutorError::new(message)
    }
}

impl From<&str> for ExecutorError {
    fn from(message: &str) -> Self {
        ExecutorError::new(message)
    }
}

/// Contract every node of the graph implements (spec §4.2, §6 public API).
///
/// `handle` dispatches on the incoming message's concrete type; all outputs
/// flow through `ctx` rather than through a return value, matching spec
/// §4.2's "Returns nothing; all outputs flow through ctx." A handler with no
/// registered match for the incoming type should return
/// [`ExecutorError`] tagged as an unhandled-message-type failure via
/// [`ExecutorError::new`] — the runner converts that into an
/// `ExecutorFailedEvent` rather than crashing (spec §4.2, §7).
#[async_trait]
pub trait Executor: Send + Sync {
    fn id(&self) -> &str;

    /// Union of declared inputs across this executor's handlers.
    fn input_types(&self) -> Vec<PayloadType>;

    /// Union of declared outputs across this executor's handlers, consumed
    /// by the validator for type-compatibility checks (spec §4.5 rule 3).
    fn output_types(&self) -> Vec<PayloadType>;

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()>;

    /// Response-handler input types this executor declares (spec §4.2
    /// "optional set of response handlers keyed by the request-info
    /// response type"). Empty for executors that never call
    /// `ctx.request_info`.
    fn response_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    /// Invoked in a later superstep once `Workflow::send_responses` injects
    /// a payload matching one of `response_types()` for a request this
    /// executor registered (spec §4.6 `RequestInfo`).
    async fn handle_response(
        &self,
        _request_id: String,
        _response: Arc<dyn AnyPayload>,
        _ctx: WorkflowContext,
    ) -> ExecutorResult<()> {
        Ok(())
    }

    /// Serializes mutable internal state for checkpointing (spec §4.2,
    /// §4.9). The default is stateless — executors that own state override
    /// both halves of this pair.
    fn save_state(&self) -> ExecutorResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Restores state captured by a prior `save_state` call during resume.
    fn restore_state(&self, _bytes: &[u8]) -> ExecutorResult<()> {
        Ok(())
    }
}
