//! Error taxonomy for the plan-and-execute pipeline.
//!
//! Every stage reports failures through [`AgentError`]. The
//! [`Orchestrator`](crate::agent::orchestrator::Orchestrator) is the only place
//! an `AgentError` is flattened into the user-visible [`Failure`].

use std::fmt;

use thiserror::Error;

use crate::api::llm::LlmError;
use crate::plan::ParsePhase;
use crate::tools::core::ToolError;

/// Errors raised while answering a single query.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The query was empty after trimming.
    #[error("Input too short: the query is empty")]
    EmptyInput,

    /// The query exceeded the configured character limit.
    #[error("Input too long: {len} characters (maximum {max})")]
    InputTooLong { len: usize, max: usize },

    /// No parse phase produced a plan from the model output.
    #[error(transparent)]
    PlanParse(#[from] PlanParseError),

    /// A tool with this name is already registered.
    #[error("tool '{name}' is already registered")]
    DuplicateTool { name: String },

    /// A plan step named a tool that is not registered.
    #[error("unknown tool '{name}' (available: {})", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    /// Resolved arguments did not satisfy the tool's parameter schema.
    #[error("invalid arguments for '{tool}' in step {call_id}: {}", .problems.join("; "))]
    InvalidArguments {
        tool: String,
        call_id: String,
        problems: Vec<String>,
    },

    /// A step referenced an id with no successful result in the context.
    #[error("step {call_id} references '{reference}', which has no usable result")]
    UnresolvedPlaceholder { call_id: String, reference: String },

    /// A tool failed and the failure was not absorbed by the retry policy.
    #[error("tool '{tool}' failed in step {call_id} after {attempts} attempt(s): {source}")]
    ToolInvocation {
        call_id: String,
        tool: String,
        retryable: bool,
        attempts: u32,
        #[source]
        source: ToolError,
    },

    /// The last step of a plan ended in failure.
    #[error("plan failed at step {call_id} ({tool}): {reason}")]
    PlanExecution {
        call_id: String,
        tool: String,
        reason: String,
    },

    /// The plan has more steps than the executor is allowed to run.
    #[error("plan has {steps} steps (maximum {max})")]
    StepLimitExceeded { steps: usize, max: usize },

    /// The answer violated the output policy.
    #[error("output policy violation: {reason}")]
    OutputPolicy { reason: String },

    /// The language model call failed.
    #[error("language model error: {0}")]
    Llm(#[from] LlmError),
}

impl AgentError {
    /// Flat classification used by [`Failure`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::EmptyInput => ErrorKind::EmptyInput,
            AgentError::InputTooLong { .. } => ErrorKind::InputTooLong,
            AgentError::PlanParse(_) => ErrorKind::PlanParse,
            AgentError::DuplicateTool { .. } => ErrorKind::DuplicateTool,
            AgentError::UnknownTool { .. } => ErrorKind::UnknownTool,
            AgentError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            AgentError::UnresolvedPlaceholder { .. } => ErrorKind::UnresolvedPlaceholder,
            AgentError::ToolInvocation { .. } => ErrorKind::ToolInvocation,
            AgentError::PlanExecution { .. } => ErrorKind::PlanExecution,
            AgentError::StepLimitExceeded { .. } => ErrorKind::StepLimitExceeded,
            AgentError::OutputPolicy { .. } => ErrorKind::OutputPolicy,
            AgentError::Llm(_) => ErrorKind::Llm,
        }
    }

    /// Whether the error is a guardrail rejection (input or output policy).
    pub fn is_guardrail(&self) -> bool {
        matches!(
            self,
            AgentError::EmptyInput | AgentError::InputTooLong { .. } | AgentError::OutputPolicy { .. }
        )
    }
}

/// Model output that no parse phase could turn into a plan.
#[derive(Debug, Clone, Error)]
#[error("could not parse a plan from model output (tried: {})", display_phases(.attempted))]
pub struct PlanParseError {
    /// The text exactly as the model returned it.
    pub raw: String,
    /// Every phase that was attempted, in order.
    pub attempted: Vec<ParsePhase>,
}

fn display_phases(phases: &[ParsePhase]) -> String {
    phases
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Failure ────────────────────────────────────────────────────────

/// Coarse error class carried by [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyInput,
    InputTooLong,
    PlanParse,
    DuplicateTool,
    UnknownTool,
    InvalidArguments,
    UnresolvedPlaceholder,
    ToolInvocation,
    PlanExecution,
    StepLimitExceeded,
    OutputPolicy,
    Llm,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::EmptyInput => "empty_input",
            ErrorKind::InputTooLong => "input_too_long",
            ErrorKind::PlanParse => "plan_parse",
            ErrorKind::DuplicateTool => "duplicate_tool",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::UnresolvedPlaceholder => "unresolved_placeholder",
            ErrorKind::ToolInvocation => "tool_invocation",
            ErrorKind::PlanExecution => "plan_execution",
            ErrorKind::StepLimitExceeded => "step_limit_exceeded",
            ErrorKind::OutputPolicy => "output_policy",
            ErrorKind::Llm => "llm",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single externally visible failure for one request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<AgentError> for Failure {
    fn from(err: AgentError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_lists_available_names() {
        let err = AgentError::UnknownTool {
            name: "stocks".into(),
            available: vec!["calc".into(), "weather".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown tool 'stocks' (available: calc, weather)"
        );
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
    }

    #[test]
    fn parse_error_names_attempted_phases() {
        let err = PlanParseError {
            raw: "{{{".into(),
            attempted: vec![ParsePhase::Strict, ParsePhase::FencedBlock],
        };
        assert!(err.to_string().contains("strict, fenced_block"));
    }

    #[test]
    fn failure_keeps_kind_and_message() {
        let failure = Failure::from(AgentError::InputTooLong { len: 11, max: 10 });
        assert_eq!(failure.kind, ErrorKind::InputTooLong);
        assert_eq!(failure.message, "Input too long: 11 characters (maximum 10)");
        assert_eq!(failure.kind.to_string(), "input_too_long");
    }

    #[test]
    fn guardrail_errors_are_flagged() {
        assert!(AgentError::EmptyInput.is_guardrail());
        assert!(
            AgentError::OutputPolicy {
                reason: "x".into()
            }
            .is_guardrail()
        );
        assert!(
            !AgentError::StepLimitExceeded { steps: 9, max: 8 }.is_guardrail()
        );
    }
}
