//! Three independent interceptor stacks wrapping agent runs, chat-client
//! calls, and function invocations (spec §4.7).
//!
//! Each [`MiddlewarePipeline<C>`] is a generic onion: every registered
//! [`Middleware`] decides whether to call `next.run(ctx)` to proceed deeper,
//! may short-circuit by not calling it, and may inspect or overwrite
//! `ctx.result` either before `next` (to skip the terminal handler
//! entirely) or after (to override the observed result passed back up the
//! stack). `Next<C>` is fully owned rather than borrowed so the recursive
//! `process` call has no lifetime parameter to thread through `async_trait`.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The terminal step a pipeline wraps — the actual agent run, chat call, or
/// function invocation — erased to a boxed future over a borrowed `&mut C`.
pub type TerminalFn<C> = dyn for<'c> Fn(&'c mut C) -> BoxFuture<'c, ()> + Send + Sync;

/// One interceptor in a [`MiddlewarePipeline`] (spec §4.7: "interceptor
/// signature: `process(context, next)`").
#[async_trait]
pub trait Middleware<C>: Send + Sync
where
    C: Send + 'static,
{
    async fn process(&self, ctx: &mut C, next: Next<C>);
}

/// The remaining portion of a pipeline, handed to a [`Middleware`] so it can
/// choose whether and when to continue the chain.
pub struct Next<C> {
    middlewares: Arc<[Arc<dyn Middleware<C>>]>,
    index: usize,
    terminal: Arc<TerminalFn<C>>,
}

impl<C: Send + 'static> Next<C> {
    /// Continues the chain: invokes the next middleware, or the terminal
    /// handler once every middleware has been visited.
    pub fn run(self, ctx: &mut C) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.middlewares.get(self.index) {
                Some(middleware) => {
                    let middleware = Arc::clone(middleware);
                    let next = Next {
                        middlewares: Arc::clone(&self.middlewares),
                        index: self.index + 1,
                        terminal: Arc::clone(&self.terminal),
                    };
                    middleware.process(ctx, next).await;
                }
                None => (self.terminal)(ctx).await,
            }
        })
    }
}

/// A registered stack of interceptors around one invocation point.
pub struct MiddlewarePipeline<C> {
    middlewares: Vec<Arc<dyn Middleware<C>>>,
}

impl<C: Send + 'static> Default for MiddlewarePipeline<C> {
    fn default() -> Self {
        Self { middlewares: Vec::new() }
    }
}

impl<C: Send + 'static> MiddlewarePipeline<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware<C>>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the full stack around `terminal`, which executes only if no
    /// middleware short-circuited by setting `ctx.result` before calling
    /// `next` (that check is the caller's responsibility since `C` is
    /// opaque here — see each context's `terminate`/`result` fields).
    pub async fn run(&self, ctx: &mut C, terminal: Arc<TerminalFn<C>>) {
        let next = Next {
            middlewares: Arc::from(self.middlewares.clone().into_boxed_slice()),
            index: 0,
            terminal,
        };
        next.run(ctx).await;
    }
}

/// Context exposed to agent middleware (spec §4.7): wraps an agent's run
/// before any LLM call.
pub struct AgentMiddlewareContext {
    pub agent_id: String,
    pub messages: Vec<Value>,
    pub thread: Vec<Value>,
    pub is_streaming: bool,
    pub metadata: HashMap<String, Value>,
    pub result: Option<Value>,
    pub terminate: bool,
}

impl AgentMiddlewareContext {
    pub fn new(agent_id: impl Into<String>, messages: Vec<Value>, is_streaming: bool) -> Self {
        Self {
            agent_id: agent_id.into(),
            messages,
            thread: Vec::new(),
            is_streaming,
            metadata: HashMap::new(),
            result: None,
            terminate: false,
        }
    }
}

/// Context exposed to chat middleware (spec §4.7): wraps each chat-client
/// call. Streaming hook registries realize "update_hooks / finalizers /
/// teardown_hooks" (spec §4.7).
pub struct ChatMiddlewareContext {
    pub messages: Vec<Value>,
    pub options: Value,
    pub is_streaming: bool,
    pub result: Option<Value>,
    pub terminate: bool,
    update_hooks: Vec<Arc<dyn Fn(&Value) + Send + Sync>>,
    finalizers: Vec<Arc<dyn Fn(&Value) + Send + Sync>>,
    teardown_hooks: Vec<Arc<dyn Fn() + Send + Sync>>,
}

impl ChatMiddlewareContext {
    pub fn new(messages: Vec<Value>, options: Value, is_streaming: bool) -> Self {
        Self {
            messages,
            options,
            is_streaming,
            result: None,
            terminate: false,
            update_hooks: Vec::new(),
            finalizers: Vec::new(),
            teardown_hooks: Vec::new(),
        }
    }

    pub fn on_update(&mut self, hook: Arc<dyn Fn(&Value) + Send + Sync>) {
        self.update_hooks.push(hook);
    }

    pub fn on_finalize(&mut self, hook: Arc<dyn Fn(&Value) + Send + Sync>) {
        self.finalizers.push(hook);
    }

    pub fn on_teardown(&mut self, hook: Arc<dyn Fn() + Send + Sync>) {
        self.teardown_hooks.push(hook);
    }

    /// Applied to each streamed update as it is produced.
    pub fn notify_update(&self, update: &Value) {
        for hook in &self.update_hooks {
            hook(update);
        }
    }

    /// Applied once to the complete assembled response.
    pub fn notify_finalized(&self, response: &Value) {
        for hook in &self.finalizers {
            hook(response);
        }
    }

    /// Invoked when the stream is closed, normally or via cancellation.
    pub fn notify_teardown(&self) {
        for hook in &self.teardown_hooks {
            hook();
        }
    }
}

/// Context exposed to function middleware (spec §4.7): wraps each
/// tool/function invocation.
pub struct FunctionMiddlewareContext {
    pub function_name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    pub terminate: bool,
}

impl FunctionMiddlewareContext {
    pub fn new(function_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            function_name: function_name.into(),
            arguments,
            result: None,
            terminate: false,
        }
    }
}

pub type AgentMiddlewarePipeline = MiddlewarePipeline<AgentMiddlewareContext>;
pub type ChatMiddlewarePipeline = MiddlewarePipeline<ChatMiddlewareContext>;
pub type FunctionMiddlewarePipeline = MiddlewarePipeline<FunctionMiddlewareContext>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingMiddleware {
        order: Arc<AtomicUsize>,
        tag: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware<FunctionMiddlewareContext> for RecordingMiddleware {
        async fn process(&self, ctx: &mut FunctionMiddlewareContext, next: Next<FunctionMiddlewareContext>) {
            self.order.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.tag);
            next.run(ctx).await;
        }
    }

    struct ShortCircuitMiddleware;

    #[async_trait]
    impl Middleware<FunctionMiddlewareContext> for ShortCircuitMiddleware {
        async fn process(&self, ctx: &mut FunctionMiddlewareContext, _next: Next<FunctionMiddlewareContext>) {
            ctx.result = Some(serde_json::json!({"short_circuited": true}));
        }
    }

    #[tokio::test]
    async fn runs_middlewares_in_order_then_terminal() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = FunctionMiddlewarePipeline::new();
        pipeline.push(Arc::new(RecordingMiddleware {
            order: Arc::new(AtomicUsize::new(0)),
            tag: "first",
            log: Arc::clone(&log),
        }));
        pipeline.push(Arc::new(RecordingMiddleware {
            order: Arc::new(AtomicUsize::new(0)),
            tag: "second",
            log: Arc::clone(&log),
        }));

        let mut ctx = FunctionMiddlewareContext::new("double", serde_json::json!({"x": 2}));
        let terminal: Arc<TerminalFn<FunctionMiddlewareContext>> = Arc::new(|ctx| {
            Box::pin(async move {
                ctx.result = Some(serde_json::json!({"x": 4}));
            })
        });
        pipeline.run(&mut ctx, terminal).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(ctx.result, Some(serde_json::json!({"x": 4})));
    }

    #[tokio::test]
    async fn middleware_can_short_circuit_before_terminal() {
        let mut pipeline = FunctionMiddlewarePipeline::new();
        pipeline.push(Arc::new(ShortCircuitMiddleware));

        let mut ctx = FunctionMiddlewareContext::new("noop", Value::Null);
        let terminal_ran = Arc::new(AtomicUsize::new(0));
        let terminal_ran_clone = Arc::clone(&terminal_ran);
        let terminal: Arc<TerminalFn<FunctionMiddlewareContext>> = Arc::new(move |_ctx| {
            let terminal_ran = Arc::clone(&terminal_ran_clone);
            Box::pin(async move {
                terminal_ran.fetch_add(1, Ordering::SeqCst);
            })
        });
        pipeline.run(&mut ctx, terminal).await;

        assert_eq!(terminal_ran.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.result, Some(serde_json::json!({"short_circuited": true})));
    }
}
