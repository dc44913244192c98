//! Configuration for the [`Orchestrator`](super::orchestrator::Orchestrator).

use std::time::Duration;

use regex::Regex;

use crate::agent::executor::ExecutorConfig;
use crate::agent::guardrails::{InputGuard, OutputGuard};
use crate::api::retry::RetryConfig;

/// Configuration for one agent.
///
/// Two construction patterns are supported:
///
/// - **Builder pattern**: start from [`AgentConfig::default()`] and chain
///   `.with_*()` methods for common settings.
/// - **Struct update syntax**: set the guard or executor structs directly
///   with `..Default::default()`.
///
/// # Example
///
/// ```ignore
/// let config = AgentConfig::default()
///     .with_tool_retry(RetryConfig::with_attempts(5))
///     .with_tool_timeout(Duration::from_secs(10))
///     .with_precision(3);
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Query sanitation.
    pub input: InputGuard,
    /// Answer shaping.
    pub output: OutputGuard,
    /// Step limits, timeouts, and the per-step retry policy.
    pub executor: ExecutorConfig,
    /// Retry policy for the model call. Only transient model errors are
    /// retried. Default: a single attempt.
    pub llm_retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            input: InputGuard::default(),
            output: OutputGuard::default(),
            executor: ExecutorConfig::default(),
            llm_retry: RetryConfig::none(),
        }
    }
}

impl AgentConfig {
    // ── Builder methods ───────────────────────────────────────────

    /// Set the longest accepted query, in characters.
    pub fn with_max_query_chars(mut self, max: usize) -> Self {
        self.input.max_chars = max;
        self
    }

    /// Set the longest answer, in characters, before truncation.
    pub fn with_max_answer_chars(mut self, max: usize) -> Self {
        self.output.max_chars = max;
        self
    }

    /// Set the decimal places kept for numeric answers.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.output.precision = precision;
        self
    }

    /// Add a redaction pattern to the output denylist.
    pub fn with_redaction(mut self, pattern: Regex) -> Self {
        self.output.denylist.push(pattern);
        self
    }

    /// Set the per-step retry policy.
    pub fn with_tool_retry(mut self, retry: RetryConfig) -> Self {
        self.executor.retry = retry;
        self
    }

    /// Limit each tool attempt to `timeout`.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor.tool_timeout = Some(timeout);
        self
    }

    /// Set the longest plan the executor will run.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.executor.max_steps = max_steps;
        self
    }

    /// Set the retry policy for the model call.
    pub fn with_llm_retry(mut self, retry: RetryConfig) -> Self {
        self.llm_retry = retry;
        self
    }
}
