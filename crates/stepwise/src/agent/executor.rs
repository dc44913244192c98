//! Runs a [`Plan`] against a [`ToolRegistry`].
//!
//! Steps execute strictly in declared order, one at a time. Before each step
//! its arguments are resolved against the results of earlier steps, checked
//! against the tool's spec, and then the tool is invoked under the retry
//! policy. Every executed step leaves exactly one [`ToolResult`] in the
//! run's [`ExecutionContext`].
//!
//! Failure handling per step:
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Reference to a missing or failed step | [`AgentError::UnresolvedPlaceholder`] |
//! | Tool not registered | [`AgentError::UnknownTool`] |
//! | Arguments don't fit the spec | [`AgentError::InvalidArguments`] |
//! | Non-retryable tool error | [`AgentError::ToolInvocation`], immediately |
//! | Retryable error, budget spent | Failure [`ToolResult`], run continues |
//!
//! If the last step ends in failure the run fails with
//! [`AgentError::PlanExecution`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::agent::events::{AgentEvent, EventHandler, NoopHandler};
use crate::api::retry::RetryConfig;
use crate::error::AgentError;
use crate::plan::{Plan, ToolCall, find_references};
use crate::tools::core::{
    Arguments, Tool, ToolError, ToolRegistry, log_tool_call, preview, validate_arguments,
};

/// Default upper bound on plan length.
pub const DEFAULT_MAX_STEPS: usize = 8;

// ── Results ────────────────────────────────────────────────────────

/// Outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failure,
}

/// The result of one executed [`ToolCall`]. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub status: StepStatus,
    /// The tool's value on success, `null` on failure.
    pub value: Value,
    /// The last error, on failure.
    pub error: Option<ToolError>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

impl ToolResult {
    fn success(step: &ToolCall, value: Value, attempts: u32, elapsed: Duration) -> Self {
        Self {
            call_id: step.id.clone(),
            tool_name: step.tool_name.clone(),
            status: StepStatus::Success,
            value,
            error: None,
            attempts,
            elapsed,
        }
    }

    fn failure(step: &ToolCall, error: ToolError, attempts: u32, elapsed: Duration) -> Self {
        Self {
            call_id: step.id.clone(),
            tool_name: step.tool_name.clone(),
            status: StepStatus::Failure,
            value: Value::Null,
            error: Some(error),
            attempts,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Step id to result, grown as the run progresses. Owned by one run.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    results: HashMap<String, ToolResult>,
    order: Vec<String>,
}

impl ExecutionContext {
    pub fn get(&self, id: &str) -> Option<&ToolResult> {
        self.results.get(id)
    }

    fn record(&mut self, result: ToolResult) {
        self.order.push(result.call_id.clone());
        self.results.insert(result.call_id.clone(), result);
    }

    /// Results in execution order.
    pub fn into_results(mut self) -> Vec<ToolResult> {
        self.order
            .iter()
            .filter_map(|id| self.results.remove(id))
            .collect()
    }
}

/// Where an [`Answer`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSource {
    /// The template of a zero-step plan.
    Direct,
    /// The value of the last step.
    ToolResult { call_id: String, tool_name: String },
}

/// The externally visible result of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
    /// The typed value `text` was rendered from.
    pub value: Value,
}

impl Answer {
    /// An answer taken verbatim from a template.
    pub fn direct(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: Value::String(text.clone()),
            text,
            source: AnswerSource::Direct,
        }
    }

    fn from_result(result: &ToolResult) -> Self {
        Self {
            text: render_value(&result.value),
            source: AnswerSource::ToolResult {
                call_id: result.call_id.clone(),
                tool_name: result.tool_name.clone(),
            },
            value: result.value.clone(),
        }
    }
}

/// An answer plus every step result, in execution order.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub answer: Answer,
    pub results: Vec<ToolResult>,
}

/// Render a value as text: strings raw, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Config ─────────────────────────────────────────────────────────

/// Executor limits and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Per-step retry policy. Default: 3 attempts.
    pub retry: RetryConfig,
    /// Limit for a single attempt. A timeout counts as a transient error.
    /// Default: `None`.
    pub tool_timeout: Option<Duration>,
    /// Plans longer than this are rejected before any step runs.
    /// Default: [`DEFAULT_MAX_STEPS`].
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            tool_timeout: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

// ── ToolExecutor ───────────────────────────────────────────────────

/// Executes plans. Holds no per-run state, so one executor can run many
/// plans concurrently.
///
/// # Example
///
/// ```ignore
/// let executor = ToolExecutor::new(registry.clone(), ExecutorConfig::default())
///     .with_event_handler(Arc::new(LoggingHandler));
/// let answer = executor.execute(&plan).await?;
/// ```
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    handler: Arc<dyn EventHandler>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            config,
            handler: Arc::new(NoopHandler),
        }
    }

    /// Set the event handler (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Execute `plan` and return its answer.
    pub async fn execute(&self, plan: &Plan) -> Result<Answer, AgentError> {
        self.execute_traced(plan).await.map(|report| report.answer)
    }

    /// Execute `plan`, returning the answer and every step result.
    pub async fn execute_traced(&self, plan: &Plan) -> Result<ExecutionReport, AgentError> {
        plan.check_shape().map_err(|reason| AgentError::PlanExecution {
            call_id: "-".into(),
            tool: "-".into(),
            reason,
        })?;
        if let Some(template) = plan.final_answer_template.as_ref().filter(|_| plan.is_direct()) {
            return Ok(ExecutionReport {
                answer: Answer::direct(template.clone()),
                results: Vec::new(),
            });
        }
        if plan.steps.len() > self.config.max_steps {
            return Err(AgentError::StepLimitExceeded {
                steps: plan.steps.len(),
                max: self.config.max_steps,
            });
        }

        let declared: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        let mut context = ExecutionContext::default();

        for step in &plan.steps {
            let result = self.run_step(step, &declared, &context).await?;
            self.handler.on_event(&AgentEvent::StepFinished { result: &result });
            context.record(result);
        }

        let results = context.into_results();
        let last = results.last().ok_or_else(|| AgentError::PlanExecution {
            call_id: "-".into(),
            tool: "-".into(),
            reason: "no step produced a result".into(),
        })?;
        match last.status {
            StepStatus::Success => Ok(ExecutionReport {
                answer: Answer::from_result(last),
                results,
            }),
            StepStatus::Failure => Err(AgentError::PlanExecution {
                call_id: last.call_id.clone(),
                tool: last.tool_name.clone(),
                reason: last
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }

    async fn run_step(
        &self,
        step: &ToolCall,
        declared: &HashSet<&str>,
        context: &ExecutionContext,
    ) -> Result<ToolResult, AgentError> {
        let resolved = resolve_arguments(&step.arguments, &step.id, declared, context)?;
        let tool = self.registry.get(&step.tool_name)?;
        let arguments = validate_arguments(tool.spec(), &step.id, resolved)?;

        self.handler.on_event(&AgentEvent::StepStarted {
            call_id: &step.id,
            tool: &step.tool_name,
            arguments: &arguments,
        });
        log_tool_call(&step.id, &step.tool_name, &arguments);

        self.invoke_with_retry(tool, step, &arguments).await
    }

    async fn invoke_with_retry(
        &self,
        tool: &dyn Tool,
        step: &ToolCall,
        arguments: &Arguments,
    ) -> Result<ToolResult, AgentError> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = self.invoke_once(tool, arguments).await;
            match outcome {
                Ok(value) => {
                    let elapsed = start.elapsed();
                    debug!(
                        "Tool {} completed in {:.0}ms (attempt {attempt})",
                        step.tool_name,
                        elapsed.as_secs_f64() * 1000.0
                    );
                    trace!("Tool {} result: {}", step.tool_name, preview(&value.to_string(), 300));
                    return Ok(ToolResult::success(step, value, attempt, elapsed));
                }
                Err(error) if !tool.is_retryable(&error) => {
                    return Err(AgentError::ToolInvocation {
                        call_id: step.id.clone(),
                        tool: step.tool_name.clone(),
                        retryable: false,
                        attempts: attempt,
                        source: error,
                    });
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        "Tool {} in step {} gave up after {attempt} attempt(s): {error}",
                        step.tool_name, step.id
                    );
                    return Ok(ToolResult::failure(step, error, attempt, start.elapsed()));
                }
                Err(error) => {
                    let delay = self.config.retry.delay_for_attempt(attempt - 1);
                    self.handler.on_event(&AgentEvent::StepRetrying {
                        call_id: &step.id,
                        tool: &step.tool_name,
                        attempt,
                        max_attempts,
                        error: &error,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn invoke_once(&self, tool: &dyn Tool, arguments: &Arguments) -> Result<Value, ToolError> {
        match self.config.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.invoke(arguments)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ToolError::transient(format!(
                    "tool '{}' timed out after {:.1}s",
                    tool.name(),
                    limit.as_secs_f64()
                ))),
            },
            None => tool.invoke(arguments).await,
        }
    }
}

// ── Placeholder resolution ─────────────────────────────────────────

/// Substitute references to earlier steps throughout `arguments`.
fn resolve_arguments(
    arguments: &Arguments,
    call_id: &str,
    declared: &HashSet<&str>,
    context: &ExecutionContext,
) -> Result<Arguments, AgentError> {
    arguments
        .iter()
        .map(|(k, v)| Ok((k.clone(), resolve_value(v, call_id, declared, context)?)))
        .collect()
}

fn resolve_value(
    value: &Value,
    call_id: &str,
    declared: &HashSet<&str>,
    context: &ExecutionContext,
) -> Result<Value, AgentError> {
    match value {
        Value::String(s) => resolve_string(s, call_id, declared, context),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_value(v, call_id, declared, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => resolve_arguments(map, call_id, declared, context).map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// A string that is exactly one reference takes the referenced value as-is;
/// references embedded in longer text are interpolated.
fn resolve_string(
    s: &str,
    call_id: &str,
    declared: &HashSet<&str>,
    context: &ExecutionContext,
) -> Result<Value, AgentError> {
    let refs = find_references(s, declared);
    if refs.is_empty() {
        return Ok(Value::String(s.to_string()));
    }

    let lookup = |id: &str| -> Result<&Value, AgentError> {
        match context.get(id) {
            Some(result) if result.is_success() => Ok(&result.value),
            _ => Err(AgentError::UnresolvedPlaceholder {
                call_id: call_id.to_string(),
                reference: id.to_string(),
            }),
        }
    };

    if let [only] = refs.as_slice()
        && s.get(only.start..only.end) == Some(s.trim())
    {
        return lookup(&only.id).cloned();
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for r in &refs {
        out.push_str(s.get(last..r.start).unwrap_or_default());
        out.push_str(&render_value(lookup(&r.id)?));
        last = r.end;
    }
    out.push_str(s.get(last..).unwrap_or_default());
    Ok(Value::String(out))
}
