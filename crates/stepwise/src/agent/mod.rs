//! The plan-and-execute pipeline.
//!
//! - [`orchestrator::Orchestrator`]: guardrails, model, parser, executor.
//!   Start here.
//! - [`executor::ToolExecutor`]: runs a parsed plan step by step with
//!   placeholder resolution and retries.
//! - [`guardrails`]: [`InputGuard`] and [`OutputGuard`].
//! - [`config::AgentConfig`]: guard limits, executor limits, retry policies.
//! - [`events`]: [`EventHandler`] trait and [`AgentEvent`] enum for
//!   observing a request. Includes [`LoggingHandler`],
//!   [`CompositeEventHandler`], and [`FnEventHandler`].
//! - [`prompt`]: planning prompt assembly.

pub mod config;
pub mod events;
pub mod executor;
pub mod guardrails;
pub mod orchestrator;
pub mod prompt;

pub use config::AgentConfig;
pub use events::{
    AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
pub use executor::{
    Answer, AnswerSource, ExecutionReport, ExecutorConfig, StepStatus, ToolExecutor, ToolResult,
};
pub use guardrails::{InputGuard, OutputGuard};
pub use orchestrator::Orchestrator;
pub use prompt::PromptBuilder;
