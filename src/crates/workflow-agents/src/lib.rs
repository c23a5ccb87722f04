//! Prebuilt agent patterns built on `workflow-core`'s [`AgentExecutor`] and
//! `MiddlewarePipeline`s, mirroring the teacher's `langgraph-prebuilt`
//! crate's role as a "prebuilt patterns" layer sitting above the core
//! engine (`langgraph-core`). Not named in the engine's own module list —
//! `workflow-core` defines the ReAct tool loop once, in `AgentExecutor`, and
//! stays free of any opinion about how an agent gets wired into a
//! `Workflow`; this crate supplies that opinion plus the deterministic test
//! doubles a calling application would otherwise have to hand-roll.
//!
//! - [`react::create_react_agent`] assembles a single-executor `Workflow`
//!   around one `AgentExecutor`, the way the teacher's
//!   `agents::react::create_react_agent` assembles a `StateGraph` around its
//!   `agent`/`tools` nodes.
//! - [`function_tool::FunctionTool`] wraps a plain closure as a
//!   `ToolDescriptor`, the common case the teacher's own tests use instead
//!   of a hand-written struct.
//! - [`test_doubles::EchoChatClient`] and [`test_doubles::ScriptedChatClient`]
//!   stand in for a real LLM provider in tests; a production `ChatClient` is
//!   an integration left to the calling application (spec §1).

pub mod error;
pub mod function_tool;
pub mod react;
pub mod test_doubles;

pub use error::{AgentsError, Result};
pub use function_tool::FunctionTool;
pub use react::{create_react_agent, ReactAgentBuilder};
pub use test_doubles::{EchoChatClient, ScriptedChatClient};
