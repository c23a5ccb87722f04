//! `WorkflowError` — the `thiserror` enum realizing spec §7's error
//! taxonomy. Grounded in the teacher's `GraphError` (`error.rs`): one
//! top-level enum with structured variants rather than stringly-typed
//! errors, matching SPEC_FULL §1's ambient addendum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by `WorkflowBuilder::build` (spec §4.5, §7 "Configuration
/// errors"). These are the only errors that can prevent a `Workflow` from
/// existing at all; everything past `build()` is an event, not a `Result`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no start executor configured")]
    MissingStartExecutor,

    #[error("start executor '{0}' is not registered")]
    UnknownStartExecutor(String),

    #[error("executor(s) unreachable from start: {0:?}")]
    GraphConnectivity(Vec<String>),

    #[error(
        "type incompatibility: source '{source}' output types {output_types:?} have no \
         assignable handler at target '{target}' (target accepts {input_types:?})"
    )]
    TypeCompatibility {
        source: String,
        target: String,
        output_types: Vec<String>,
        input_types: Vec<String>,
    },

    #[error("duplicate edge group: {source} -> {target} ({kind})")]
    EdgeDuplication {
        source: String,
        target: String,
        kind: String,
    },

    #[error("edge references unknown executor '{0}'")]
    UnknownExecutor(String),

    #[error("FanIn group targeting '{0}' has no declared sources")]
    EmptyFanInSources(String),

    #[error("FanIn target '{target}' does not declare a List<T> input type")]
    FanInTargetNotList { target: String },

    #[error("SwitchCase group from '{0}' declares no cases")]
    EmptySwitchCases(String),

    #[error("executor id '{0}' registered more than once")]
    DuplicateExecutor(String),
}

/// Errors surfaced by [`crate::context::RunnerContext::inject_response`]
/// (spec §4.1 / §7 "Request-info errors"): never fatal to the workflow,
/// only to the caller of `SendResponses`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestInfoError {
    #[error("no pending request with id '{0}'")]
    UnknownRequest(String),

    #[error("request '{0}' has already been responded to")]
    AlreadyResponded(String),
}

/// Classifies why a fatal error terminates the whole workflow (spec §4.4,
/// §7 "Fatal errors"), as opposed to a handler error that only fails one
/// executor for one superstep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// A handler explicitly tagged its error `terminate-workflow`.
    HandlerRequested(String),
    /// `superstep_index` exceeded `max_iterations` without a `WorkflowOutput`.
    MaxIterationsExceeded { max_iterations: u64 },
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalReason::HandlerRequested(msg) => write!(f, "handler requested termination: {msg}"),
            FatalReason::MaxIterationsExceeded { max_iterations } => {
                write!(f, "exceeded max_iterations ({max_iterations}) without producing output")
            }
        }
    }
}
