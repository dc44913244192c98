//! The language-model capability: "given a prompt, return text".
//!
//! Provider adapters live outside this crate. Anything that can turn a
//! prompt into text implements [`LlmClient`]; two in-process clients ship
//! here: [`ScriptedLlm`] for tests and demos, and
//! [`RulePlanner`](super::rule_planner::RulePlanner), a deterministic
//! planner for the built-in tool set.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use thiserror::Error;

use crate::api::retry::is_transient_error;
use crate::tools::spec::ToolSpec;

/// Boxed future returned by [`LlmClient::complete`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// Failure classes of a completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Network trouble or rate limiting. May be retried by the caller.
    Transient,
    /// The provider refused the content. Never retried.
    ContentPolicy,
    Other,
}

/// Error returned by [`LlmClient::complete`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn content_policy(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ContentPolicy,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Other,
            message: message.into(),
        }
    }

    /// Classify a free-text provider error.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("content policy") || lower.contains("content_filter") {
            Self::content_policy(message)
        } else if is_transient_error(&message) {
            Self::transient(message)
        } else {
            Self::other(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == LlmErrorKind::Transient
    }
}

/// A language model that turns a planning prompt into raw text.
///
/// The tool specs are passed alongside the prompt for clients that support
/// native function declarations; clients that don't can ignore them, since
/// the prompt already lists every tool.
pub trait LlmClient: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str, tools: &'a [&'a ToolSpec]) -> LlmFuture<'a>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "llm"
    }
}

// ── ScriptedLlm ────────────────────────────────────────────────────

/// Returns queued responses in order and records every prompt it receives.
///
/// # Example
///
/// ```ignore
/// let llm = ScriptedLlm::new([r#"{"steps": [{"tool": "calc", "args": {"expr": "2+2"}}]}"#]);
/// let orchestrator = Orchestrator::new(Arc::new(llm), registry);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response (builder pattern).
    pub fn then(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    /// Queue a failure (builder pattern).
    pub fn then_fail(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn push(&self, response: Result<String, LlmError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }
}

impl LlmClient for ScriptedLlm {
    fn complete<'a>(&'a self, prompt: &'a str, _tools: &'a [&'a ToolSpec]) -> LlmFuture<'a> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(LlmError::other("scripted client has no responses left")));
        Box::pin(async move { next })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
