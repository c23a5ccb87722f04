//! Ambient stack shared by the rest of the workspace: error-context helpers,
//! retry policies, and `tracing` subscriber setup. None of this is part of
//! the workflow engine's public surface; it's the plumbing every crate in
//! the workspace reaches for instead of hand-rolling its own.

pub mod error;
pub mod logging;
pub mod retry;

pub use error::{ErrorContext, Result, UtilsError};
pub use retry::{retry_async, RetryPolicy, RetryState};
