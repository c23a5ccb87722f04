//! Graph-based multi-agent workflow runtime.
//!
//! A [`workflow::Workflow`] is a directed graph of [`executor::Executor`]
//! nodes connected by [`edge::EdgeGroup`] routing policies. A
//! [`builder::WorkflowBuilder`] validates the graph at construction time;
//! the [`runner`] module drives it one superstep at a time, delivering
//! [`message::Message`]s through [`edge::EdgeRunner`] into each
//! [`context::RunnerContext`]'s mailbox, and [`workflow::Workflow::run`]
//! hands the caller back a [`workflow::RunHandle`] streaming
//! [`events::WorkflowEvent`]s.

pub mod agent;
pub mod builder;
pub mod cache;
pub mod context;
pub mod edge;
pub mod error;
pub mod events;
pub mod executor;
pub mod message;
pub mod middleware;
pub mod observer;
pub mod registry;
pub mod runner;
pub mod subworkflow;
pub mod visualization;
pub mod workflow;

pub use agent::{
    AgentExecutor, AgentExecutorRequest, AgentExecutorResponse, ChatClient, ChatClientError, ChatCompletion,
    ChatMessage, ChatRole, ToolCall, ToolDescriptor, ToolError,
};
pub use builder::WorkflowBuilder;
pub use cache::{Cache, CacheConfig, CacheMetrics, EvictionPolicy, ToolResultCache};
pub use context::{RequestInfoEntry, ResponseDelivery, RunnerContext, SharedStateHandle, WorkflowContext};
pub use edge::{condition, EdgeCondition, EdgeGroup, EdgeRunner, FanInBatch};
pub use error::{FatalReason, RequestInfoError, Result, WorkflowError};
pub use events::WorkflowEvent;
pub use executor::{Executor, ExecutorError, ExecutorResult};
pub use message::{downcast_payload, AnyPayload, Message, Payload, PayloadType, TraceContext};
pub use middleware::{
    AgentMiddlewareContext, AgentMiddlewarePipeline, ChatMiddlewareContext, ChatMiddlewarePipeline, FunctionMiddlewareContext,
    FunctionMiddlewarePipeline, Middleware, Next,
};
pub use observer::{Observer, TracingObserver};
pub use registry::PayloadRegistry;
pub use runner::RunOutcome;
pub use subworkflow::{JsonPayload, SubWorkflowExecutor, SubWorkflowRequestMessage, SubWorkflowResponseMessage};
pub use visualization::{visualize, VisualizationFormat, VisualizationOptions};
pub use workflow::{ResumeWorkflowError, RunHandle, RunnerConfig, Workflow};
