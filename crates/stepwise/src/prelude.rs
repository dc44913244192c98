//! Convenience re-exports for common `stepwise` types.
//!
//! ```ignore
//! use stepwise::prelude::*;
//! ```
//!
//! Covers building a registry, wiring an orchestrator, and handling its
//! results. Parser internals and repair helpers are left out; import those
//! from [`plan`](crate::plan) directly.

// ── Agent ───────────────────────────────────────────────────────────
pub use crate::agent::{
    AgentConfig, AgentEvent, Answer, AnswerSource, CompositeEventHandler, EventHandler,
    ExecutorConfig, FnEventHandler, InputGuard, LoggingHandler, NoopHandler, Orchestrator,
    OutputGuard, ToolExecutor, ToolResult,
};

// ── Model ───────────────────────────────────────────────────────────
pub use crate::api::llm::{LlmClient, LlmError, LlmFuture, ScriptedLlm};
pub use crate::api::retry::RetryConfig;
pub use crate::api::rule_planner::RulePlanner;

// ── Plans and errors ────────────────────────────────────────────────
pub use crate::error::{AgentError, ErrorKind, Failure};
pub use crate::json_schema_for;
pub use crate::plan::parser::PlanParser;
pub use crate::plan::{Plan, ToolCall};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    Arguments, FnTool, KnowledgeBase, ParamType, Tool, ToolError, ToolErrorKind, ToolFuture,
    ToolRegistry, ToolSpec,
};
