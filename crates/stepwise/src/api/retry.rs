//! Bounded retry with exponential backoff and jitter.
//!
//! [`RetryConfig`] is shared by tool invocation (inside the
//! [`ToolExecutor`](crate::agent::executor::ToolExecutor)) and by the
//! orchestrator's language-model call. Whether a particular error may be
//! retried is always the caller's decision; [`is_transient_error`] is the
//! shared heuristic for free-text errors.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first (1 = never retry).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to scale delays down by a jitter factor.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default backoff with the given attempt budget.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..Default::default()
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::with_attempts(1)
    }

    /// The given attempt budget with zero delay between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Calculate the delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number, no rand needed.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or the attempt budget is spent. Returns the last error on failure.
pub async fn retry_async<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_attempts && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    "Transient {label} error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                    attempt, config.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether an error string indicates a transient (retryable) failure.
pub fn is_transient_error(error: &str) -> bool {
    let transient_statuses = ["429", "500", "502", "503", "504"];
    if transient_statuses
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "temporarily unavailable",
        "broken pipe",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn default_config_allows_three_attempts() {
        assert_eq!(RetryConfig::default().max_attempts, 3);
        assert_eq!(RetryConfig::none().max_attempts, 1);
        assert_eq!(RetryConfig::with_attempts(0).max_attempts, 1);
    }

    #[test]
    fn delay_doubles_until_capped() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: false,
            ..RetryConfig::with_attempts(5)
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(10));
    }

    #[test]
    fn jitter_reduces_delay() {
        let jittered = RetryConfig::with_attempts(3);
        let plain = RetryConfig {
            jitter: false,
            ..RetryConfig::with_attempts(3)
        };
        assert!(jittered.delay_for_attempt(2) <= plain.delay_for_attempt(2));
    }

    #[test]
    fn immediate_has_no_delay() {
        let config = RetryConfig::immediate(4);
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn transient_errors_detected() {
        assert!(is_transient_error("weather API HTTP 503: unavailable"));
        assert!(is_transient_error("request failed: connection reset"));
        assert!(is_transient_error("operation timed out"));
        assert!(!is_transient_error("HTTP 400: bad request"));
        assert!(!is_transient_error("division by zero"));
    }

    #[tokio::test]
    async fn retry_async_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, String> = retry_async(
            &RetryConfig::immediate(3),
            "test",
            |_| true,
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err("timed out".to_string()) } else { Ok("done") } }
            },
        )
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn retry_async_stops_on_non_retryable() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_async(
            &RetryConfig::immediate(5),
            "test",
            |e: &String| is_transient_error(e),
            || {
                calls.set(calls.get() + 1);
                async { Err("bad request".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retry_async_returns_last_error_when_exhausted() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_async(
            &RetryConfig::immediate(2),
            "test",
            |_| true,
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("timeout {n}")) }
            },
        )
        .await;
        assert_eq!(result, Err("timeout 2".to_string()));
    }
}
