//! Model-facing plumbing.
//!
//! - [`llm`]: the [`LlmClient`](llm::LlmClient) capability and
//!   [`ScriptedLlm`](llm::ScriptedLlm).
//! - [`rule_planner`]: [`RulePlanner`](rule_planner::RulePlanner), a
//!   deterministic planner for the built-in tools.
//! - [`retry`]: [`RetryConfig`](retry::RetryConfig) with exponential backoff
//!   and jitter, shared by tool calls and model calls.

pub mod llm;
pub mod retry;
pub mod rule_planner;
