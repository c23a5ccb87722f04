//! Errors surfaced by `workflow-agents`' builders, grounded in the
//! teacher's `langgraph-prebuilt::error::PrebuiltError` shape: one variant
//! per builder-time failure plus a pass-through for the underlying engine's
//! own error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentsError>;

#[derive(Debug, Error)]
pub enum AgentsError {
    /// The workflow assembled from an agent pattern failed validation.
    #[error("agent workflow failed to build: {0}")]
    Workflow(#[from] workflow_core::WorkflowError),

    /// A [`crate::test_doubles::ScriptedChatClient`] was called more times
    /// than it was scripted for.
    #[error("scripted chat client exhausted its script after {calls} call(s)")]
    ScriptExhausted { calls: usize },
}
