//! Exponential backoff retry policy.
//!
//! `AgentExecutor` retries chat-client calls "per the injected client's
//! policy" (spec §4.8). This is the default policy shape a caller plugs in:
//! capped exponential backoff with jitter, the same knobs the teacher exposes
//! in `langgraph_core::retry` (max attempts, initial/backoff/max interval,
//! jitter toggle), rather than a bespoke scheme invented for this port.

use rand::Rng;
use std::time::Duration;

/// Configuration for retrying a transient failure (LLM call, tool execution).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry, in seconds.
    pub initial_interval: f64,
    /// Multiplier applied to the interval after each retry.
    pub backoff_factor: f64,
    /// Upper bound on the computed interval, in seconds.
    pub max_interval: f64,
    /// Randomize the computed interval within 0.5x-1.5x to avoid thundering herd.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 30.0,
            jitter: true,
        }
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait before the given 0-indexed attempt number.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        if attempt >= self.max_attempts {
            return Duration::from_secs(0);
        }
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval);
        let final_delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };
        Duration::from_secs_f64(final_delay.max(0.0))
    }

    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Tracks attempts made so far against a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempts: usize,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, error: Option<String>) {
        self.attempts += 1;
        self.last_error = error;
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }
}

/// Runs `op` under `policy`, sleeping between attempts, until it succeeds or
/// the policy is exhausted. `is_retryable` lets the caller exclude permanent
/// failures (validation errors) from the retry loop.
pub async fn retry_async<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) || !policy.should_retry(attempt) {
                    return Err(err);
                }
                let delay = policy.calculate_delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5).with_jitter(false);
        assert_eq!(policy.calculate_delay(0), Duration::from_secs_f64(0.5));
        assert_eq!(policy.calculate_delay(1), Duration::from_secs_f64(1.0));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs_f64(2.0));
        assert!(policy.calculate_delay(10) <= Duration::from_secs_f64(30.0));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::new(3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }

    #[tokio::test]
    async fn retry_async_stops_on_non_retryable() {
        let policy = RetryPolicy::new(5).with_initial_interval(0.0);
        let mut calls = 0;
        let result: Result<(), &str> = retry_async(
            &policy,
            |_| false,
            |_attempt| {
                calls += 1;
                async { Err("permanent") }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retry_async_exhausts_then_fails() {
        let policy = RetryPolicy::new(3).with_initial_interval(0.0);
        let mut calls = 0;
        let result: Result<(), &str> = retry_async(
            &policy,
            |_| true,
            |_attempt| {
                calls += 1;
                async { Err("transient") }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
