//! Logging init and timing helpers built on `tracing`.
//!
//! Mirrors the teacher's `tooling::logging` module: a one-shot subscriber
//! installer for binaries embedding this workspace, plus a `timed` wrapper
//! for instrumenting async work without hand-rolling `Instant` bookkeeping
//! at every call site.

use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` formatter honoring `RUST_LOG`, defaulting
/// to `info` when unset. Intended for binaries/tests embedding the workflow
/// engine; the engine itself never initializes a global subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Logs the wall-clock duration of `future` at debug level under `label`.
pub async fn timed<F, T>(label: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    debug!(label, "starting");
    let result = future.await;
    debug!(label, elapsed_ms = start.elapsed().as_millis() as u64, "completed");
    result
}
