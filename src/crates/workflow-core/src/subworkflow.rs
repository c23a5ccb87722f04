//! Embeds a [`Workflow`] as a node of a parent graph (spec §4.10).

use crate::context::WorkflowContext;
use crate::events::WorkflowEvent;
use crate::executor::{Executor, ExecutorError, ExecutorResult};
use crate::message::{Message, Payload, PayloadType};
use crate::workflow::Workflow;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic typed envelope for handing opaque JSON across a sub-workflow
/// boundary, since the embedded graph's own start executor may expect any
/// concrete `Payload` type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPayload(pub Value);

impl Payload for JsonPayload {
    const TYPE_TAG: &'static str = "json_payload";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubWorkflowRequestMessage {
    pub payload: Value,
}

impl Payload for SubWorkflowRequestMessage {
    const TYPE_TAG: &'static str = "sub_workflow_request";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubWorkflowResponseMessage {
    pub payload: Option<Value>,
    pub error: Option<String>,
}

impl Payload for SubWorkflowResponseMessage {
    const TYPE_TAG: &'static str = "sub_workflow_response";
}

/// Runs an embedded [`Workflow`] to completion within the parent's
/// superstep, forwarding its event stream (tagged with this executor's id)
/// into the parent's (spec §4.10).
pub struct SubWorkflowExecutor {
    id: String,
    workflow: Workflow,
}

impl SubWorkflowExecutor {
    pub fn new(id: impl Into<String>, workflow: Workflow) -> Self {
        Self { id: id.into(), workflow }
    }
}

#[async_trait]
impl Executor for SubWorkflowExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![SubWorkflowRequestMessage::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![SubWorkflowResponseMessage::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let request: SubWorkflowRequestMessage = message.downcast().ok_or_else(|| {
            ExecutorError::new(format!(
                "unhandled-message-type: sub-workflow executor '{}' cannot handle '{}'",
                self.id, message.payload_type
            ))
        })?;

        let run_id = format!("{}/{}", ctx.trace_ctx().run_id, uuid::Uuid::new_v4());
        let mut handle = self.workflow.run(run_id, JsonPayload(request.payload));

        let mut outputs = Vec::new();
        let mut failure = None;
        while let Some(event) = handle.next().await {
            match &event {
                WorkflowEvent::WorkflowOutput { value } => outputs.push(value.clone()),
                WorkflowEvent::WorkflowFailed { error } => failure = Some(error.clone()),
                _ => {}
            }
            let is_terminal = matches!(
                event,
                WorkflowEvent::WorkflowCompleted | WorkflowEvent::WorkflowFailed { .. }
            );
            ctx.emit_event(tag_for_parent(&self.id, event));
            if is_terminal {
                break;
            }
        }

        let response = match failure {
            Some(error) => SubWorkflowResponseMessage { payload: None, error: Some(error) },
            None => SubWorkflowResponseMessage {
                payload: Some(Value::Array(outputs)),
                error: None,
            },
        };
        ctx.send_message(response, None);
        Ok(())
    }
}

/// Prefixes a forwarded sub-workflow event's executor id with the parent
/// executor's id (spec §4.10: "tagged with the parent executor id").
fn tag_for_parent(parent_id: &str, event: WorkflowEvent) -> WorkflowEvent {
    match event {
        WorkflowEvent::ExecutorInvoked { executor_id, message_type } => WorkflowEvent::ExecutorInvoked {
            executor_id: format!("{parent_id}/{executor_id}"),
            message_type,
        },
        WorkflowEvent::ExecutorCompleted { executor_id, duration_ms } => WorkflowEvent::ExecutorCompleted {
            executor_id: format!("{parent_id}/{executor_id}"),
            duration_ms,
        },
        WorkflowEvent::ExecutorFailed { executor_id, error } => WorkflowEvent::ExecutorFailed {
            executor_id: format!("{parent_id}/{executor_id}"),
            error,
        },
        other => other,
    }
}
