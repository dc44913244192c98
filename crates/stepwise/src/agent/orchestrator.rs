//! The request pipeline and its error boundary.
//!
//! ```text
//! query ─► InputGuard ─► planning prompt ─► LlmClient ─► PlanParser
//!                                                            │
//!        Answer ◄── OutputGuard ◄── ToolExecutor ◄───────────┘
//! ```
//!
//! [`Orchestrator::answer`] is the only place an [`AgentError`] is turned
//! into a [`Failure`]. Callers that want the typed error use
//! [`Orchestrator::try_answer`].

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, trace};

use crate::agent::config::AgentConfig;
use crate::agent::events::{AgentEvent, EventHandler, NoopHandler};
use crate::agent::executor::{Answer, AnswerSource, ToolExecutor};
use crate::agent::guardrails::InputGuard;
use crate::agent::prompt::planning_prompt;
use crate::api::llm::{LlmClient, LlmError};
use crate::api::retry::retry_async;
use crate::error::{AgentError, Failure};
use crate::plan::parser::{ParsedPlan, PlanParser};
use crate::tools::core::{ToolRegistry, preview};
use crate::tools::spec::ParamType;

/// Answers queries by planning with a model and executing the plan.
///
/// Holds no per-request state: one orchestrator can serve many concurrent
/// requests against the same shared registry.
///
/// # Example
///
/// ```ignore
/// let registry = Arc::new(ToolRegistry::new().with_builtin_tools()?);
/// let agent = Orchestrator::new(Arc::new(RulePlanner::new()), registry)
///     .with_config(AgentConfig::default().with_precision(2))
///     .with_event_handler(Arc::new(LoggingHandler));
///
/// match agent.answer("What is 12.5% of 243?").await {
///     Ok(answer) => println!("{}", answer.text),
///     Err(failure) => eprintln!("Error: {failure}"),
/// }
/// ```
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    parser: PlanParser,
    config: AgentConfig,
    handler: Arc<dyn EventHandler>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            registry,
            parser: PlanParser::new(),
            config: AgentConfig::default(),
            handler: Arc::new(NoopHandler),
        }
    }

    /// Set the configuration (builder pattern).
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the plan parser (builder pattern).
    pub fn with_parser(mut self, parser: PlanParser) -> Self {
        self.parser = parser;
        self
    }

    /// Set the event handler (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer `query`. Any error becomes a single [`Failure`].
    pub async fn answer(&self, query: &str) -> Result<Answer, Failure> {
        self.try_answer(query).await.map_err(Failure::from)
    }

    /// Answer several independent queries concurrently.
    ///
    /// Results come back in input order. One failing query does not affect
    /// the others.
    pub async fn answer_many<I, S>(&self, queries: I) -> Vec<Result<Answer, Failure>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        join_all(
            queries
                .into_iter()
                .map(|q| async move { self.answer(q.as_ref()).await }),
        )
        .await
    }

    /// Answer `query`, exposing the typed error.
    pub async fn try_answer(&self, query: &str) -> Result<Answer, AgentError> {
        let result = self.run(query).await;
        match &result {
            Ok(answer) => self.handler.on_event(&AgentEvent::Answered { answer }),
            Err(error) => self.handler.on_event(&AgentEvent::Failed { error }),
        }
        result
    }

    async fn run(&self, query: &str) -> Result<Answer, AgentError> {
        let query = self.input_guard().sanitize(query)?;
        self.handler.on_event(&AgentEvent::QueryAccepted { query: &query });

        let specs = self.registry.list_specs();
        let prompt = planning_prompt(&specs, &query);
        trace!("Planning prompt:\n{prompt}");

        let raw = retry_async(&self.config.llm_retry, self.llm.name(), LlmError::is_transient, || {
            self.llm.complete(&prompt, &specs)
        })
        .await?;
        debug!("Model output ({} chars): {}", raw.chars().count(), preview(&raw, 200));

        let ParsedPlan { plan, phase } = self.parser.parse_with_phase(&raw)?;
        self.handler.on_event(&AgentEvent::PlanParsed { plan: &plan, phase });

        let executor = ToolExecutor::new(self.registry.clone(), self.config.executor.clone())
            .with_event_handler(self.handler.clone());
        let answer = executor.execute(&plan).await?;

        let expected = self.expected_type(&answer);
        self.config.output.apply(answer, expected)
    }

    fn input_guard(&self) -> &InputGuard {
        &self.config.input
    }

    /// The declared output type of the tool that produced `answer`.
    fn expected_type(&self, answer: &Answer) -> Option<ParamType> {
        match &answer.source {
            AnswerSource::Direct => None,
            AnswerSource::ToolResult { tool_name, .. } => self
                .registry
                .get(tool_name)
                .ok()
                .and_then(|tool| tool.spec().output_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::FnEventHandler;
    use crate::api::llm::ScriptedLlm;
    use crate::api::retry::RetryConfig;
    use crate::error::ErrorKind;
    use crate::tools::core::{Arguments, FnTool, ToolError};
    use crate::tools::spec::ToolSpec;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    fn registry() -> Arc<ToolRegistry> {
        let double = FnTool::new(
            ToolSpec::builder("double", "Double a number")
                .param("n", ParamType::Number, "Input")
                .returns(ParamType::Number)
                .build(),
            |args: Arguments| async move {
                let n = args.get("n").and_then(Value::as_f64).unwrap_or_default();
                Ok(json!(n * 2.0))
            },
        );
        let words = FnTool::new(
            ToolSpec::builder("words", "Describe a number")
                .returns(ParamType::Number)
                .build(),
            |_| async { Ok(json!("lots")) },
        );
        let broken = FnTool::new(ToolSpec::builder("broken", "Always fails").build(), |_| async {
            Err(ToolError::failed("disk on fire"))
        });
        Arc::new(
            ToolRegistry::new()
                .with(double)
                .and_then(|r| r.with(words))
                .and_then(|r| r.with(broken))
                .expect("distinct names"),
        )
    }

    fn agent(llm: ScriptedLlm) -> Orchestrator {
        Orchestrator::new(Arc::new(llm), registry())
    }

    #[tokio::test]
    async fn plan_is_executed_and_numeric_answer_formatted() {
        let llm = ScriptedLlm::new([
            r#"{"steps": [{"tool": "double", "args": {"n": 1.0625}}, {"tool": "double", "args": {"n": "t0"}}]}"#,
        ]);
        let answer = agent(llm).answer("Quadruple 1.0625").await.unwrap();
        assert_eq!(answer.text, "4.25");
        assert_eq!(
            answer.source,
            AnswerSource::ToolResult {
                call_id: "t1".into(),
                tool_name: "double".into()
            }
        );
    }

    #[tokio::test]
    async fn prompt_carries_tools_and_sanitized_query() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"steps": [], "final_answer": "hi"}"#]));
        let agent = Orchestrator::new(llm.clone(), registry());
        agent.answer("  hello <|im_start|> there ").await.unwrap();
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("double(n: number) -> number"));
        assert!(prompts[0].ends_with("Query: hello there"));
    }

    #[tokio::test]
    async fn guard_rejection_skips_the_model() {
        let llm = Arc::new(ScriptedLlm::default());
        let agent = Orchestrator::new(llm.clone(), registry())
            .with_config(AgentConfig::default().with_max_query_chars(3));
        let failure = agent.answer("four").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InputTooLong);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn prose_reply_is_a_direct_answer() {
        let llm = ScriptedLlm::new(["Paris is the capital of France."]);
        let answer = agent(llm).answer("Capital of France?").await.unwrap();
        assert_eq!(answer.text, "Paris is the capital of France.");
        assert_eq!(answer.source, AnswerSource::Direct);
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_plan_parse_failure() {
        let llm = ScriptedLlm::new(["{{{ [ nope"]);
        let failure = agent(llm).answer("anything").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::PlanParse);
    }

    #[tokio::test]
    async fn declared_number_output_is_enforced() {
        let llm = ScriptedLlm::new([r#"{"steps": [{"tool": "words", "args": {}}]}"#]);
        let failure = agent(llm).answer("how many?").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::OutputPolicy);
    }

    #[tokio::test]
    async fn non_retryable_tool_error_is_reported() {
        let llm = ScriptedLlm::new([r#"{"steps": [{"tool": "broken", "args": {}}]}"#]);
        let failure = agent(llm).answer("break it").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ToolInvocation);
        assert!(failure.message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn transient_model_errors_follow_llm_retry() {
        let script = || {
            ScriptedLlm::default()
                .then_fail(LlmError::transient("HTTP 503"))
                .then(r#"{"steps": [], "final_answer": "recovered"}"#)
        };

        let failure = agent(script()).answer("q").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Llm);

        let retrying = agent(script())
            .with_config(AgentConfig::default().with_llm_retry(RetryConfig::immediate(2)));
        assert_eq!(retrying.answer("q").await.unwrap().text, "recovered");
    }

    #[tokio::test]
    async fn answer_many_keeps_input_order() {
        let llm = ScriptedLlm::new([
            r#"{"steps": [], "final_answer": "one"}"#,
            r#"{"steps": [], "final_answer": "two"}"#,
        ]);
        let results = agent(llm).answer_many(["first", ""]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().map(|a| a.text.as_str()), Ok("one"));
        assert_eq!(results[1].as_ref().unwrap_err().kind, ErrorKind::EmptyInput);
    }

    #[tokio::test]
    async fn lifecycle_events_are_emitted_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FnEventHandler::new(move |event| {
            let name = match event {
                AgentEvent::QueryAccepted { .. } => "accepted",
                AgentEvent::PlanParsed { .. } => "parsed",
                AgentEvent::StepStarted { .. } => "started",
                AgentEvent::StepRetrying { .. } => "retrying",
                AgentEvent::StepFinished { .. } => "finished",
                AgentEvent::Answered { .. } => "answered",
                AgentEvent::Failed { .. } => "failed",
            };
            if let Ok(mut seen) = sink.lock() {
                seen.push(name);
            }
        });
        let llm = ScriptedLlm::new([r#"{"steps": [{"tool": "double", "args": {"n": 2}}]}"#]);
        agent(llm)
            .with_event_handler(Arc::new(handler))
            .answer("double 2")
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["accepted", "parsed", "started", "finished", "answered"]
        );
    }
}
