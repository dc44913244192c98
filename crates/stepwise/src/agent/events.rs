//! Lifecycle events for one request.
//!
//! The [`Orchestrator`](super::orchestrator::Orchestrator) and
//! [`ToolExecutor`](super::executor::ToolExecutor) report progress through
//! [`AgentEvent`] variants. Callers implement [`EventHandler`] to observe
//! them for logging, metrics, or tests.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::executor::{Answer, AnswerSource, StepStatus, ToolResult};
use crate::error::AgentError;
use crate::plan::{ParsePhase, Plan};
use crate::tools::core::{Arguments, ToolError, preview};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted while answering a query.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// The query passed the input guardrail.
    QueryAccepted { query: &'a str },
    /// The model output was turned into a plan.
    PlanParsed { plan: &'a Plan, phase: ParsePhase },
    /// A step is about to be invoked with resolved arguments.
    StepStarted {
        call_id: &'a str,
        tool: &'a str,
        arguments: &'a Arguments,
    },
    /// A step failed retryably and will be attempted again after `delay`.
    StepRetrying {
        call_id: &'a str,
        tool: &'a str,
        attempt: u32,
        max_attempts: u32,
        error: &'a ToolError,
        delay: Duration,
    },
    /// A step produced its result (success or exhausted retries).
    StepFinished { result: &'a ToolResult },
    /// The request produced an answer.
    Answered { answer: &'a Answer },
    /// The request failed.
    Failed { error: &'a AgentError },
}

/// Handler for agent events.
///
/// The default implementation ignores every event.
///
/// # Example
///
/// ```ignore
/// struct CountSteps(AtomicUsize);
///
/// impl EventHandler for CountSteps {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::StepFinished { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::PlanParsed { plan, .. } = event {
///         println!("{plan}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, TraceHandler);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::QueryAccepted { query } => {
                info!("Query: {}", preview(query, 200));
            }
            AgentEvent::PlanParsed { plan, phase } => {
                if phase.is_repair() {
                    info!("Plan ({} steps, repaired via {phase}): {plan}", plan.steps.len());
                } else {
                    info!("Plan ({} steps): {plan}", plan.steps.len());
                }
            }
            AgentEvent::StepStarted { call_id, tool, .. } => {
                debug!("Step {call_id} starting: {tool}");
            }
            AgentEvent::StepRetrying {
                call_id,
                tool,
                attempt,
                max_attempts,
                error,
                delay,
            } => {
                warn!(
                    "Step {call_id} ({tool}) attempt {attempt}/{max_attempts} failed: {error}. Retrying in {delay:?}"
                );
            }
            AgentEvent::StepFinished { result } => match result.status {
                StepStatus::Success => debug!(
                    "Step {} ({}) succeeded after {} attempt(s) in {:.0}ms",
                    result.call_id,
                    result.tool_name,
                    result.attempts,
                    result.elapsed.as_secs_f64() * 1000.0
                ),
                StepStatus::Failure => warn!(
                    "Step {} ({}) failed after {} attempt(s): {}",
                    result.call_id,
                    result.tool_name,
                    result.attempts,
                    result.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown error")
                ),
            },
            AgentEvent::Answered { answer } => match &answer.source {
                AnswerSource::Direct => info!("Answer (direct): {}", preview(&answer.text, 200)),
                AnswerSource::ToolResult { call_id, tool_name } => {
                    info!("Answer (from {call_id}/{tool_name}): {}", preview(&answer.text, 200))
                }
            },
            AgentEvent::Failed { error } => {
                warn!("Request failed [{}]: {error}", error.kind());
            }
        }
    }
}
