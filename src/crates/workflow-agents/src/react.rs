//! `create_react_agent`: the single-node ReAct tool-calling pattern,
//! grounded in the teacher's `agents::react::create_react_agent` /
//! `ReactAgentConfig` (`langgraph-prebuilt/src/agents/react.rs`). Unlike the
//! teacher, the think/act/observe loop itself already lives in
//! `workflow_core::AgentExecutor` (spec §4.8) — this builder's job is just
//! to wire one up as a single-executor `Workflow`, the way the teacher
//! wires its `StateGraph`'s `agent`/`tools` nodes and `should_continue`
//! routing around the same loop.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use workflow_core::{
    AgentExecutor, AgentExecutorRequest, AgentExecutorResponse, AgentMiddlewarePipeline, ChatClient, ChatClientError,
    ChatCompletion, ChatMessage, ChatMiddlewarePipeline, ChatRole, FunctionMiddlewarePipeline, ToolDescriptor, ToolResultCache,
    Workflow, WorkflowBuilder,
};
use workflow_utils::RetryPolicy;

use crate::error::Result as AgentsResult;

/// Wraps an inner [`ChatClient`] and prepends a system message to every
/// call whose conversation doesn't already start with one (teacher:
/// `build_react_graph`'s "inject system prompt if first message isn't
/// system" step in the `agent` node).
struct SystemPromptChatClient {
    inner: Arc<dyn ChatClient>,
    system_prompt: String,
}

#[async_trait]
impl ChatClient for SystemPromptChatClient {
    async fn complete(&self, messages: &[ChatMessage], tool_schemas: &[Value]) -> Result<ChatCompletion, ChatClientError> {
        let already_has_system = matches!(messages.first(), Some(m) if m.role == ChatRole::System);
        if already_has_system {
            return self.inner.complete(messages, tool_schemas).await;
        }
        let mut with_system = Vec::with_capacity(messages.len() + 1);
        with_system.push(ChatMessage {
            role: ChatRole::System,
            content: self.system_prompt.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
        with_system.extend_from_slice(messages);
        self.inner.complete(&with_system, tool_schemas).await
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry_policy()
    }
}

/// Fluent builder for a single-node ReAct agent `Workflow`, analogous to the
/// teacher's `ReactAgentConfig` (`with_max_iterations`, `with_system_prompt`,
/// `build`).
pub struct ReactAgentBuilder {
    id: String,
    chat_client: Arc<dyn ChatClient>,
    tools: Vec<Arc<dyn ToolDescriptor>>,
    system_prompt: Option<String>,
    max_iterations: Option<u64>,
    tool_cache: Option<Arc<ToolResultCache>>,
    agent_middleware: Option<AgentMiddlewarePipeline>,
    chat_middleware: Option<ChatMiddlewarePipeline>,
    function_middleware: Option<FunctionMiddlewarePipeline>,
}

impl ReactAgentBuilder {
    pub fn with_tool(mut self, tool: Arc<dyn ToolDescriptor>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_tool_cache(mut self, cache: Arc<ToolResultCache>) -> Self {
        self.tool_cache = Some(cache);
        self
    }

    pub fn with_agent_middleware(mut self, pipeline: AgentMiddlewarePipeline) -> Self {
        self.agent_middleware = Some(pipeline);
        self
    }

    pub fn with_chat_middleware(mut self, pipeline: ChatMiddlewarePipeline) -> Self {
        self.chat_middleware = Some(pipeline);
        self
    }

    pub fn with_function_middleware(mut self, pipeline: FunctionMiddlewarePipeline) -> Self {
        self.function_middleware = Some(pipeline);
        self
    }

    /// Validates and assembles the single-node `Workflow`. The agent is
    /// both the start and only executor, so reachability/type-compatibility
    /// validation (spec §4.5) trivially passes; this still goes through
    /// `WorkflowBuilder::build` rather than constructing a `Workflow`
    /// directly so future editors who add edges get the same guarantees
    /// every other workflow gets.
    pub fn build(self) -> AgentsResult<Workflow> {
        let chat_client: Arc<dyn ChatClient> = match self.system_prompt {
            Some(system_prompt) => Arc::new(SystemPromptChatClient { inner: self.chat_client, system_prompt }),
            None => self.chat_client,
        };

        let mut agent = AgentExecutor::new(self.id.clone(), chat_client);
        for tool in self.tools {
            agent = agent.with_tool(tool);
        }
        if let Some(max_iterations) = self.max_iterations {
            agent = agent.with_max_iterations(max_iterations);
        }
        if let Some(cache) = self.tool_cache {
            agent = agent.with_tool_cache(cache);
        }
        if let Some(pipeline) = self.agent_middleware {
            agent = agent.with_agent_middleware(pipeline);
        }
        if let Some(pipeline) = self.chat_middleware {
            agent = agent.with_chat_middleware(pipeline);
        }
        if let Some(pipeline) = self.function_middleware {
            agent = agent.with_function_middleware(pipeline);
        }

        let workflow = WorkflowBuilder::new()
            .register_payload::<AgentExecutorRequest>()
            .register_payload::<AgentExecutorResponse>()
            .add_executor(Arc::new(agent))
            .set_start_executor(self.id)
            .build()?;
        Ok(workflow)
    }
}

/// Starts a [`ReactAgentBuilder`] for executor id `id`, talking to
/// `chat_client` (teacher: `create_react_agent(llm_function, tools)`).
pub fn create_react_agent(id: impl Into<String>, chat_client: Arc<dyn ChatClient>) -> ReactAgentBuilder {
    ReactAgentBuilder {
        id: id.into(),
        chat_client,
        tools: Vec::new(),
        system_prompt: None,
        max_iterations: None,
        tool_cache: None,
        agent_middleware: None,
        chat_middleware: None,
        function_middleware: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_tool::FunctionTool;
    use crate::test_doubles::ScriptedChatClient;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use workflow_core::{AgentMiddlewareContext, Middleware, Next, ToolCall as ModelToolCall};

    #[tokio::test]
    async fn responds_directly_when_the_model_makes_no_tool_calls() {
        let chat_client = Arc::new(ScriptedChatClient::new(vec![ChatMessage::assistant("42")]));
        let workflow = create_react_agent("agent", chat_client).build().unwrap();

        let mut handle = workflow.run(
            "run-1",
            AgentExecutorRequest {
                messages: vec![ChatMessage::user("what is 6 * 7?")],
                should_respond: true,
            },
        );

        let mut responses = Vec::new();
        while let Some(event) = handle.next().await {
            if let workflow_core::WorkflowEvent::WorkflowOutput { value } = event {
                responses.push(value);
            }
        }
        assert!(handle.join().await.is_some());
        assert!(responses.is_empty(), "agent doesn't yield_output by itself; it answers via send_message");
    }

    #[tokio::test]
    async fn runs_a_tool_then_answers() {
        let mut first_call = ChatMessage::assistant("");
        first_call.tool_calls.push(ModelToolCall {
            id: "call_1".to_string(),
            name: "double".to_string(),
            arguments: json!({"x": 21}),
        });
        let chat_client = Arc::new(ScriptedChatClient::new(vec![first_call, ChatMessage::assistant("42")]));

        let double_tool = FunctionTool::new("double", json!({"type": "object"}), |args| {
            Box::pin(async move {
                let x = args["x"].as_f64().unwrap_or(0.0);
                Ok(json!({ "result": x * 2.0 }))
            })
        });

        let workflow = create_react_agent("agent", chat_client.clone())
            .with_tool(double_tool.into_descriptor())
            .build()
            .unwrap();

        let mut handle = workflow.run(
            "run-1",
            AgentExecutorRequest {
                messages: vec![ChatMessage::user("double 21")],
                should_respond: true,
            },
        );

        while handle.next().await.is_some() {}
        assert!(handle.join().await.is_some());
        assert_eq!(chat_client.call_count(), 2);
    }

    /// Scenario F (spec §8): agent middleware sets `ctx.result` before
    /// calling `next`, so the agent answers with the canned response and the
    /// chat client (and by extension any function middleware) is never
    /// reached at all.
    struct CannedResponseMiddleware {
        response: ChatMessage,
    }

    #[async_trait]
    impl Middleware<AgentMiddlewareContext> for CannedResponseMiddleware {
        async fn process(&self, ctx: &mut AgentMiddlewareContext, _next: Next<AgentMiddlewareContext>) {
            ctx.result = Some(serde_json::to_value(&self.response).unwrap());
        }
    }

    #[tokio::test]
    async fn scenario_f_agent_middleware_override_skips_the_chat_client_entirely() {
        let chat_client = Arc::new(ScriptedChatClient::new(vec![ChatMessage::assistant("should never be reached")]));

        let mut agent_middleware = AgentMiddlewarePipeline::new();
        agent_middleware.push(Arc::new(CannedResponseMiddleware {
            response: ChatMessage::assistant("canned"),
        }));

        let workflow = create_react_agent("agent", chat_client.clone())
            .with_agent_middleware(agent_middleware)
            .build()
            .unwrap();

        let mut handle = workflow.run(
            "run-f",
            AgentExecutorRequest {
                messages: vec![ChatMessage::user("hello")],
                should_respond: true,
            },
        );
        while handle.next().await.is_some() {}
        assert!(handle.join().await.is_some());

        assert_eq!(chat_client.call_count(), 0, "chat middleware/client must not be invoked when agent middleware overrides the result");
    }
}
