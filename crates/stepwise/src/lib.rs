//! Plan-and-execute tool-using agent.
//!
//! `stepwise` answers a natural-language query by asking a language model
//! for a *plan*, an ordered list of tool calls, and then executing that plan
//! against a registry of typed tools. Later steps can use earlier results
//! through placeholders (`t0`, `{t0}`, `{{t0}}`, `${t0}`). The pipeline is
//! wrapped in guardrails on both ends and reports every failure as one
//! typed error.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use stepwise::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AgentError> {
//!     let registry = Arc::new(ToolRegistry::new().with_builtin_tools()?);
//!     let agent = Orchestrator::new(Arc::new(RulePlanner::new()), registry)
//!         .with_event_handler(Arc::new(LoggingHandler));
//!
//!     let answer = agent.try_answer("What is 12.5% of 243?").await?;
//!     assert_eq!(answer.text, "30.38");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Define tools:** the [`Tool`](tools::core::Tool) trait,
//!   [`FnTool`](tools::core::FnTool) for closures, and
//!   [`ToolSpec`](tools::spec::ToolSpec) for names, typed parameters, and
//!   usage examples. Collect them in a
//!   [`ToolRegistry`](tools::core::ToolRegistry).
//!
//! - **Plug in a model:** implement [`LlmClient`](api::llm::LlmClient).
//!   [`ScriptedLlm`](api::llm::ScriptedLlm) replays canned replies;
//!   [`RulePlanner`](api::rule_planner::RulePlanner) plans deterministically
//!   for the built-in tools.
//!
//! - **Parse model output:** [`PlanParser`](plan::parser::PlanParser) tries a
//!   strict canonical parse first, then a fixed sequence of repairs.
//!
//! - **Observe a request:** implement
//!   [`EventHandler`](agent::events::EventHandler) or use
//!   [`LoggingHandler`](agent::events::LoggingHandler).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Orchestrator`](agent::orchestrator::Orchestrator), executor, guardrails, config, events, prompt |
//! | [`plan`] | [`Plan`](plan::Plan) model, references, strict and loose parsing |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, registry, specs, built-in tools |
//! | [`api`] | Model capability, rule-based planner, retry with backoff |
//! | [`error`] | [`AgentError`](error::AgentError) and the user-facing [`Failure`](error::Failure) |

pub mod agent;
pub mod api;
pub mod error;
pub mod plan;
pub mod prelude;
pub mod tools;

use schemars::JsonSchema;

/// Generate a JSON Schema `Value` from a type that derives `JsonSchema`.
///
/// Used by [`ToolSpecBuilder::parameters_for`](tools::spec::ToolSpecBuilder::parameters_for)
/// to derive parameter lists from typed argument structs.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs {
///     /// City name.
///     city: String,
/// }
///
/// let schema = json_schema_for::<WeatherArgs>();
/// assert_eq!(schema["required"][0], "city");
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
