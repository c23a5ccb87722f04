//! [`AgentExecutor`]: adapts an LLM chat-capable agent to the [`Executor`]
//! contract (spec §4.8).

use crate::cache::ToolResultCache;
use crate::context::WorkflowContext;
use crate::executor::{Executor, ExecutorError, ExecutorResult};
use crate::message::{Message, Payload, PayloadType};
use crate::middleware::{
    AgentMiddlewareContext, AgentMiddlewarePipeline, ChatMiddlewareContext, ChatMiddlewarePipeline,
    FunctionMiddlewareContext, FunctionMiddlewarePipeline, TerminalFn,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use workflow_utils::{retry_async, RetryPolicy};

/// One turn of a conversation (spec §4.8's "messages"/"thread").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result: Value) -> Self {
        Self {
            role: ChatRole::Tool,
            content: result.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// A tool failure reported back to the model as a `FunctionResultContent`
    /// with an `error` field (spec §4.8 failure model), rather than aborting
    /// the tool-call loop.
    pub fn tool_error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::tool_result(tool_call_id, serde_json::json!({ "error": error.into() }))
    }
}

/// One model response: the assistant message plus any tool calls it made.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ChatClientError(pub String);

impl From<String> for ChatClientError {
    fn from(value: String) -> Self {
        ChatClientError(value)
    }
}

/// Injected LLM provider capability (spec §1: "treated as an injected
/// `ChatClient` capability", out of scope to implement concretely here).
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tool_schemas: &[Value]) -> Result<ChatCompletion, ChatClientError>;

    /// Retry policy for transient failures (spec §4.8: "retried per the
    /// injected client's policy"). Defaults to three attempts with backoff.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ToolError(pub String);

/// Injected tool-schema/invocation capability (spec §1: "treated as an
/// injected `ToolDescriptor`").
#[async_trait]
pub trait ToolDescriptor: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> Value;
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Input to an `AgentExecutor` (spec §4.8). `should_respond=false` records
/// the messages into the thread without invoking the model — used to
/// broadcast context during group-chat-style orchestrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutorRequest {
    pub messages: Vec<ChatMessage>,
    pub should_respond: bool,
}

impl Payload for AgentExecutorRequest {
    const TYPE_TAG: &'static str = "agent_executor_request";
}

/// Output of an `AgentExecutor` (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutorResponse {
    pub agent_run_response: ChatMessage,
    pub full_conversation: Vec<ChatMessage>,
}

impl Payload for AgentExecutorResponse {
    const TYPE_TAG: &'static str = "agent_executor_response";
}

/// The shared, cheaply-cloneable core of an [`AgentExecutor`]: everything the
/// tool loop touches, moved (via `Arc`/`Clone`) into the terminal closure
/// wrapped by `agent_middleware` rather than borrowed, since a
/// `MiddlewarePipeline`'s terminal must be `'static` (spec §4.7's onion
/// wraps a *call*, not a borrow).
#[derive(Clone)]
struct AgentRuntime {
    id: String,
    chat_client: Arc<dyn ChatClient>,
    tools: Vec<Arc<dyn ToolDescriptor>>,
    chat_middleware: Arc<ChatMiddlewarePipeline>,
    function_middleware: Arc<FunctionMiddlewarePipeline>,
    max_iterations: u64,
    thread: Arc<AsyncMutex<Vec<ChatMessage>>>,
    tool_cache: Option<Arc<ToolResultCache>>,
}

impl AgentRuntime {
    async fn emit_response(&self, ctx: &WorkflowContext, response: ChatMessage) {
        let full_conversation = self.thread.lock().await.clone();
        ctx.send_message(
            AgentExecutorResponse {
                agent_run_response: response,
                full_conversation,
            },
            None,
        );
    }

    /// Runs one chat-client call through the chat-middleware pipeline, with
    /// transient failures retried per `chat_client.retry_policy()` (spec
    /// §4.8).
    async fn call_chat_client(&self, messages: Vec<ChatMessage>, is_streaming: bool) -> Result<ChatCompletion, ChatClientError> {
        let tool_schemas: Vec<Value> = self.tools.iter().map(|t| t.schema()).collect();
        let mut chat_ctx = ChatMiddlewareContext::new(
            messages.iter().map(|m| serde_json::to_value(m).unwrap_or(Value::Null)).collect(),
            serde_json::json!({ "tools": tool_schemas }),
            is_streaming,
        );

        let chat_client = Arc::clone(&self.chat_client);
        let policy = self.chat_client.retry_policy();
        let terminal: Arc<TerminalFn<ChatMiddlewareContext>> = Arc::new(move |ctx| {
            let chat_client = Arc::clone(&chat_client);
            let messages = messages.clone();
            let tool_schemas = tool_schemas.clone();
            let policy = policy.clone();
            Box::pin(async move {
                let outcome = retry_async(
                    &policy,
                    |_err: &ChatClientError| true,
                    |_attempt| {
                        let chat_client = Arc::clone(&chat_client);
                        let messages = messages.clone();
                        let tool_schemas = tool_schemas.clone();
                        async move { chat_client.complete(&messages, &tool_schemas).await }
                    },
                )
                .await;
                ctx.result = Some(match outcome {
                    Ok(completion) => serde_json::json!({
                        "message": serde_json::to_value(&completion.message).unwrap_or(Value::Null),
                    }),
                    Err(err) => serde_json::json!({ "error": err.to_string() }),
                });
            })
        });

        self.chat_middleware.run(&mut chat_ctx, terminal).await;

        match chat_ctx.result {
            Some(value) => {
                if let Some(error) = value.get("error").and_then(Value::as_str) {
                    Err(ChatClientError(error.to_string()))
                } else {
                    let message_value = value.get("message").cloned().unwrap_or(Value::Null);
                    let message: ChatMessage =
                        serde_json::from_value(message_value).map_err(|e| ChatClientError(e.to_string()))?;
                    Ok(ChatCompletion { message })
                }
            }
            None => Err(ChatClientError("chat middleware produced no result".to_string())),
        }
    }

    /// Executes one tool call through the function-middleware pipeline
    /// (spec §4.8 step 2). Tool failures are captured rather than
    /// propagated, per the failure model in spec §4.8.
    async fn invoke_tool(&self, tool_call: &ToolCall) -> Value {
        let Some(tool) = self.tools.iter().find(|t| t.name() == tool_call.name).cloned() else {
            return serde_json::json!({ "error": format!("no tool registered for '{}'", tool_call.name) });
        };

        let cache_key = self
            .tool_cache
            .as_ref()
            .map(|_| (tool_call.name.clone(), crate::cache::hash_payload(&tool_call.arguments)));
        if let (Some(cache), Some(key)) = (&self.tool_cache, &cache_key) {
            if let Some(cached) = cache.get(key).await {
                return cached;
            }
        }

        let mut function_ctx = FunctionMiddlewareContext::new(tool_call.name.clone(), tool_call.arguments.clone());
        let terminal: Arc<TerminalFn<FunctionMiddlewareContext>> = Arc::new(move |ctx| {
            let tool = Arc::clone(&tool);
            Box::pin(async move {
                ctx.result = Some(match tool.invoke(ctx.arguments.clone()).await {
                    Ok(value) => value,
                    Err(err) => serde_json::json!({ "error": err.to_string() }),
                });
            })
        });

        self.function_middleware.run(&mut function_ctx, terminal).await;
        let result = function_ctx
            .result
            .unwrap_or_else(|| serde_json::json!({ "error": "function middleware produced no result" }));

        if let (Some(cache), Some(key)) = (&self.tool_cache, cache_key) {
            if result.get("error").is_none() {
                cache.put(key, result.clone()).await;
            }
        }

        result
    }

    /// The ReAct tool loop itself (spec §4.8): call the model, emit a
    /// response if it made no tool calls, otherwise invoke every requested
    /// tool and feed the results back in, bounded by `max_iterations`. Runs
    /// as the terminal of `agent_middleware`'s pipeline, so agent-level
    /// middleware that short-circuits never reaches this at all.
    async fn run_tool_loop(&self, ctx: &WorkflowContext) -> ExecutorResult<()> {
        let mut iteration = 0u64;
        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                let last = self.thread.lock().await.last().cloned().unwrap_or_else(|| ChatMessage::assistant(""));
                self.emit_response(ctx, last).await;
                return Ok(());
            }

            let messages_snapshot = self.thread.lock().await.clone();
            let completion = self
                .call_chat_client(messages_snapshot, ctx.is_streaming())
                .await
                .map_err(|e| ExecutorError::new(e.to_string()))?;

            self.thread.lock().await.push(completion.message.clone());

            if completion.message.tool_calls.is_empty() {
                self.emit_response(ctx, completion.message).await;
                return Ok(());
            }

            for tool_call in &completion.message.tool_calls {
                let result = self.invoke_tool(tool_call).await;
                let tool_message = ChatMessage::tool_result(tool_call.id.clone(), result);
                self.thread.lock().await.push(tool_message);
            }
        }
    }
}

/// Adapts a [`ChatClient`] plus a set of [`ToolDescriptor`]s into an
/// [`Executor`] running a ReAct-style tool loop (spec §4.8).
pub struct AgentExecutor {
    runtime: AgentRuntime,
    agent_middleware: AgentMiddlewarePipeline,
}

impl AgentExecutor {
    pub fn new(id: impl Into<String>, chat_client: Arc<dyn ChatClient>) -> Self {
        Self {
            runtime: AgentRuntime {
                id: id.into(),
                chat_client,
                tools: Vec::new(),
                chat_middleware: Arc::new(ChatMiddlewarePipeline::new()),
                function_middleware: Arc::new(FunctionMiddlewarePipeline::new()),
                max_iterations: crate::builder::DEFAULT_MAX_ITERATIONS,
                thread: Arc::new(AsyncMutex::new(Vec::new())),
                tool_cache: None,
            },
            agent_middleware: AgentMiddlewarePipeline::new(),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolDescriptor>) -> Self {
        self.runtime.tools.push(tool);
        self
    }

    /// Memoizes tool results by `(tool name, hash of arguments)`. Off by
    /// default — only deterministic tools should opt in, since a hit skips
    /// invoking `tool.invoke` entirely.
    pub fn with_tool_cache(mut self, cache: Arc<ToolResultCache>) -> Self {
        self.runtime.tool_cache = Some(cache);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.runtime.max_iterations = max_iterations;
        self
    }

    /// Wraps the entire tool loop: a middleware that sets `ctx.result`
    /// without calling `next.run` skips the chat and function middleware
    /// pipelines (and the chat client / tools) entirely, answering with its
    /// own canned response instead (spec §4.7).
    pub fn with_agent_middleware(mut self, pipeline: AgentMiddlewarePipeline) -> Self {
        self.agent_middleware = pipeline;
        self
    }

    pub fn with_chat_middleware(mut self, pipeline: ChatMiddlewarePipeline) -> Self {
        self.runtime.chat_middleware = Arc::new(pipeline);
        self
    }

    pub fn with_function_middleware(mut self, pipeline: FunctionMiddlewarePipeline) -> Self {
        self.runtime.function_middleware = Arc::new(pipeline);
        self
    }
}

#[async_trait]
impl Executor for AgentExecutor {
    fn id(&self) -> &str {
        &self.runtime.id
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![AgentExecutorRequest::payload_type()]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![AgentExecutorResponse::payload_type()]
    }

    async fn handle(&self, message: Message, ctx: WorkflowContext) -> ExecutorResult<()> {
        let request: AgentExecutorRequest = message.downcast().ok_or_else(|| {
            ExecutorError::new(format!(
                "unhandled-message-type: agent executor '{}' cannot handle '{}'",
                self.runtime.id, message.payload_type
            ))
        })?;

        {
            let mut thread = self.runtime.thread.lock().await;
            thread.extend(request.messages);
        }

        if !request.should_respond {
            return Ok(());
        }

        let messages_snapshot = self.runtime.thread.lock().await.clone();
        let mut agent_ctx = AgentMiddlewareContext::new(
            self.runtime.id.clone(),
            messages_snapshot.iter().map(|m| serde_json::to_value(m).unwrap_or(Value::Null)).collect(),
            ctx.is_streaming(),
        );

        let ran_terminal = Arc::new(AtomicBool::new(false));
        let error_slot: Arc<std::sync::Mutex<Option<ExecutorError>>> = Arc::new(std::sync::Mutex::new(None));

        let runtime = self.runtime.clone();
        let ctx_for_terminal = ctx.clone();
        let ran_terminal_for_terminal = Arc::clone(&ran_terminal);
        let error_slot_for_terminal = Arc::clone(&error_slot);
        let terminal: Arc<TerminalFn<AgentMiddlewareContext>> = Arc::new(move |_agent_ctx| {
            let runtime = runtime.clone();
            let ctx = ctx_for_terminal.clone();
            let ran_terminal = Arc::clone(&ran_terminal_for_terminal);
            let error_slot = Arc::clone(&error_slot_for_terminal);
            Box::pin(async move {
                ran_terminal.store(true, Ordering::SeqCst);
                if let Err(err) = runtime.run_tool_loop(&ctx).await {
                    *error_slot.lock().unwrap() = Some(err);
                }
            })
        });

        self.agent_middleware.run(&mut agent_ctx, terminal).await;

        if let Some(err) = error_slot.lock().unwrap().take() {
            return Err(err);
        }

        if !ran_terminal.load(Ordering::SeqCst) {
            // Agent middleware short-circuited before reaching the tool loop:
            // answer with whatever it placed in `ctx.result` instead.
            let canned = agent_ctx.result.take().unwrap_or(Value::Null);
            let response = serde_json::from_value::<ChatMessage>(canned.clone())
                .unwrap_or_else(|_| ChatMessage::assistant(canned.to_string()));
            self.runtime.emit_response(&ctx, response).await;
        }

        Ok(())
    }

    fn save_state(&self) -> ExecutorResult<Vec<u8>> {
        let thread = self.runtime.thread.try_lock().map_err(|_| ExecutorError::new("agent thread busy during checkpoint"))?;
        serde_json::to_vec(&*thread).map_err(|e| ExecutorError::new(e.to_string()))
    }

    fn restore_state(&self, bytes: &[u8]) -> ExecutorResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let restored: Vec<ChatMessage> = serde_json::from_slice(bytes).map_err(|e| ExecutorError::new(e.to_string()))?;
        let mut thread = self.runtime.thread.try_lock().map_err(|_| ExecutorError::new("agent thread busy during restore"))?;
        *thread = restored;
        Ok(())
    }
}
