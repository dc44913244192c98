//! Tool abstraction and the name-keyed registry.
//!
//! The [`Tool`] trait defines what every tool provides: a [`ToolSpec`] and an
//! async `invoke` method over JSON arguments. Tools are collected into a
//! [`ToolRegistry`], built once at startup and then shared read-only behind
//! an `Arc` by every request.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::api::retry::is_transient_error;
use crate::error::AgentError;
use crate::tools::spec::ToolSpec;

/// Boxed future returned by [`Tool::invoke`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// JSON arguments passed to a tool, after placeholder resolution and coercion.
pub type Arguments = Map<String, Value>;

// ── ToolError ──────────────────────────────────────────────────────

/// Failure classes a tool can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolErrorKind {
    /// Timeouts, dropped connections, rate limits. Retryable by default.
    Transient,
    /// The arguments made no sense to the tool.
    InvalidInput,
    /// The request is well-formed but outside what the tool can do.
    Unsupported,
    /// Anything else.
    Failed,
}

impl ToolErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolErrorKind::Transient => "transient",
            ToolErrorKind::InvalidInput => "invalid_input",
            ToolErrorKind::Unsupported => "unsupported",
            ToolErrorKind::Failed => "failed",
        }
    }
}

/// Error returned by [`Tool::invoke`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Transient, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidInput, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unsupported, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Failed, message)
    }

    /// Classify a free-text error message.
    ///
    /// Messages that look like network trouble (timeouts, connection resets,
    /// HTTP 429/5xx) are [`Transient`](ToolErrorKind::Transient), everything
    /// else is [`Failed`](ToolErrorKind::Failed).
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if is_transient_error(&message) {
            ToolErrorKind::Transient
        } else {
            ToolErrorKind::Failed
        };
        Self { kind, message }
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// A callable tool a plan step can name.
///
/// Implementors provide:
/// - A [`ToolSpec`] describing the name, description, and typed parameters.
/// - An async [`Tool::invoke`] method receiving arguments that have already
///   been resolved, coerced, and validated against that spec.
/// - Optionally, a retry classification via [`Tool::is_retryable`].
///
/// # Example
///
/// ```ignore
/// struct StockPrice { client: PriceClient, spec: ToolSpec }
///
/// impl Tool for StockPrice {
///     fn spec(&self) -> &ToolSpec { &self.spec }
///
///     fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
///         let symbol = arguments["symbol"].as_str().unwrap_or_default().to_string();
///         Box::pin(async move {
///             self.client.quote(&symbol).await
///                 .map(Value::from)
///                 .map_err(|e| ToolError::from_message(e.to_string()))
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The declared spec. Must not change after registration.
    fn spec(&self) -> &ToolSpec;

    /// Invoke the tool.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible (object-safe).
    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_>;

    /// The tool's name (convenience, delegates to the spec).
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Whether a failed attempt may be retried. Defaults to transient
    /// errors only.
    fn is_retryable(&self, error: &ToolError) -> bool {
        error.kind == ToolErrorKind::Transient
    }
}

// ── FnTool ─────────────────────────────────────────────────────────

/// Owned future produced by an erased [`FnTool`] handler.
type BoxedToolResult = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

/// Type-erased async handler for [`FnTool`].
type ErasedToolHandler = Box<dyn Fn(Arguments) -> BoxedToolResult + Send + Sync>;

/// A closure-based tool.
///
/// Use [`FnTool::new`] for handlers that take the raw argument map and
/// [`FnTool::typed`] for handlers that want a deserialized struct. For
/// tools holding state (tables, clients, counters), implement [`Tool`]
/// directly.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct EchoArgs {
///     /// Text to echo back.
///     text: String,
/// }
///
/// let tool = FnTool::typed(
///     ToolSpec::builder("echo", "Echo the input").parameters_for::<EchoArgs>().build(),
///     |args: EchoArgs| async move { Ok(Value::String(args.text)) },
/// );
/// ```
pub struct FnTool {
    spec: ToolSpec,
    handler: ErasedToolHandler,
    retry_on: Vec<ToolErrorKind>,
}

impl FnTool {
    /// Create a tool from a handler over the raw argument map.
    pub fn new<F, Fut>(spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            spec,
            handler: Box::new(move |args: Arguments| -> BoxedToolResult {
                Box::pin(handler(args))
            }),
            retry_on: vec![ToolErrorKind::Transient],
        }
    }

    /// Create a tool whose handler receives arguments deserialized into `A`.
    ///
    /// A deserialization failure is reported as
    /// [`InvalidInput`](ToolErrorKind::InvalidInput).
    pub fn typed<A, F, Fut>(spec: ToolSpec, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let erased = move |raw: Arguments| -> BoxedToolResult {
            match serde_json::from_value::<A>(Value::Object(raw)) {
                Ok(args) => Box::pin(handler(args)),
                Err(e) => Box::pin(async move {
                    Err(ToolError::invalid_input(format!("invalid tool arguments: {e}")))
                }),
            }
        };
        Self {
            spec,
            handler: Box::new(erased),
            retry_on: vec![ToolErrorKind::Transient],
        }
    }

    /// Replace the error kinds that may be retried (builder pattern).
    pub fn retry_on(mut self, kinds: &[ToolErrorKind]) -> Self {
        self.retry_on = kinds.to_vec();
        self
    }
}

impl Tool for FnTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        (self.handler)(arguments.clone())
    }

    fn is_retryable(&self, error: &ToolError) -> bool {
        self.retry_on.contains(&error.kind)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.spec.name)
            .field("retry_on", &self.retry_on)
            .finish()
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// Name-keyed collection of tools.
///
/// Registration order is kept so that [`list_specs`](Self::list_specs) and
/// the schema export are deterministic. Names are unique: registering a
/// second tool with the same name fails with
/// [`AgentError::DuplicateTool`].
///
/// # Example
///
/// ```ignore
/// let registry = ToolRegistry::new()
///     .with_builtin_tools()?
///     .with(StockPrice::new(client))?;
///
/// let registry = Arc::new(registry);
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateTool { name });
        }
        debug!("Registered tool {name}");
        self.index.insert(name, self.tools.len());
        self.tools.push(Box::new(tool));
        Ok(())
    }

    /// Register a closure over the raw argument map.
    pub fn register_fn<F, Fut>(&mut self, spec: ToolSpec, handler: F) -> Result<(), AgentError>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(FnTool::new(spec, handler))
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Result<Self, AgentError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<&dyn Tool, AgentError> {
        match self.index.get(name) {
            Some(&i) => Ok(self.tools[i].as_ref()),
            None => Err(AgentError::UnknownTool {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            }),
        }
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All specs, in registration order.
    pub fn list_specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// JSON array of `{name, description, parameters}` entries.
    pub fn json_schemas(&self) -> Value {
        Value::Array(self.tools.iter().map(|t| t.spec().to_export()).collect())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Check resolved arguments against a spec, coercing where allowed.
///
/// Fills defaults for absent optional parameters, coerces values to the
/// declared types, and then validates the result against the spec's JSON
/// Schema. Arguments not named by the spec pass through untouched. All
/// problems are collected before failing.
pub fn validate_arguments(
    spec: &ToolSpec,
    call_id: &str,
    arguments: Arguments,
) -> Result<Arguments, AgentError> {
    let mut out = arguments;
    let mut problems = Vec::new();

    for param in &spec.params {
        match out.remove(&param.name) {
            Some(value) if !value.is_null() => match param.param_type.coerce(value) {
                Ok(v) => {
                    out.insert(param.name.clone(), v);
                }
                Err(e) => problems.push(format!("'{}': {e}", param.name)),
            },
            _ => {
                if let Some(default) = &param.default {
                    out.insert(param.name.clone(), default.clone());
                } else if param.required {
                    problems.push(format!("missing required parameter '{}'", param.name));
                }
            }
        }
    }

    if problems.is_empty() {
        let instance = Value::Object(out.clone());
        match jsonschema::validator_for(&spec.to_json_schema()) {
            Ok(validator) => problems.extend(
                validator
                    .iter_errors(&instance)
                    .map(|e| format!("{}: {e}", e.instance_path())),
            ),
            // A spec that doesn't compile to a schema skips the second pass.
            Err(e) => debug!("Schema for tool {} not compilable: {e}", spec.name),
        }
    }

    if problems.is_empty() {
        Ok(out)
    } else {
        Err(AgentError::InvalidArguments {
            tool: spec.name.clone(),
            call_id: call_id.to_string(),
            problems,
        })
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(call_id: &str, name: &str, arguments: &Arguments) {
    let rendered = Value::Object(arguments.clone()).to_string();
    info!("[tool] {call_id} {}({})", name, preview(&rendered, 120));
    debug!("[tool] {name} full args ({} bytes)", rendered.len());
    trace!("[tool] {name} arguments: {rendered}");
}

/// First `max` characters of `s`, with `...` appended if anything was cut.
pub fn preview(s: &str, max: usize) -> String {
    let mut out: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::spec::ParamType;
    use serde_json::json;

    struct EchoTool {
        spec: ToolSpec,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                spec: ToolSpec::builder("echo", "Echo the input")
                    .param("text", ParamType::String, "Text to echo")
                    .build(),
            }
        }
    }

    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
            let text = arguments.get("text").cloned().unwrap_or(Value::Null);
            Box::pin(async move { Ok(text) })
        }
    }

    fn fail_tool(kind: ToolErrorKind) -> FnTool {
        FnTool::new(ToolSpec::builder("fail", "Always fails").build(), move |_| async move {
            Err(ToolError::new(kind, "intentional failure"))
        })
    }

    #[test]
    fn registry_keeps_registration_order() {
        let registry = ToolRegistry::new()
            .with(EchoTool::new())
            .and_then(|r| r.with(fail_tool(ToolErrorKind::Failed)))
            .expect("distinct names");
        assert_eq!(registry.names(), vec!["echo", "fail"]);
        let specs = registry.list_specs();
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[1].name, "fail");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new()).expect("first registration");
        let err = registry.register(EchoTool::new()).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool { ref name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_tool_lookup_fails() {
        let registry = ToolRegistry::new().with(EchoTool::new()).unwrap();
        match registry.get("nope") {
            Err(AgentError::UnknownTool { name, available }) => {
                assert_eq!(name, "nope");
                assert_eq!(available, vec!["echo".to_string()]);
            }
            other => panic!("expected UnknownTool, got {:?}", other.map(|t| t.name().to_string())),
        }
    }

    #[tokio::test]
    async fn registered_tool_is_invocable() {
        let registry = ToolRegistry::new().with(EchoTool::new()).unwrap();
        let tool = registry.get("echo").unwrap();
        let mut args = Arguments::new();
        args.insert("text".into(), json!("hello"));
        assert_eq!(tool.invoke(&args).await, Ok(json!("hello")));
    }

    #[tokio::test]
    async fn typed_fn_tool_rejects_bad_arguments() {
        #[derive(serde::Deserialize)]
        struct Args {
            n: i64,
        }
        let tool = FnTool::typed(
            ToolSpec::builder("double", "Double n").param("n", ParamType::Integer, "").build(),
            |args: Args| async move { Ok(json!(args.n * 2)) },
        );

        let mut args = Arguments::new();
        args.insert("n".into(), json!(21));
        assert_eq!(tool.invoke(&args).await, Ok(json!(42)));

        args.insert("n".into(), json!("not a number"));
        let err = tool.invoke(&args).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidInput);
    }

    #[test]
    fn retry_classification_defaults_to_transient() {
        let tool = fail_tool(ToolErrorKind::Failed);
        assert!(tool.is_retryable(&ToolError::transient("timed out")));
        assert!(!tool.is_retryable(&ToolError::failed("boom")));

        let tool = fail_tool(ToolErrorKind::Failed).retry_on(&[ToolErrorKind::Failed]);
        assert!(tool.is_retryable(&ToolError::failed("boom")));
        assert!(!tool.is_retryable(&ToolError::transient("timed out")));
    }

    #[test]
    fn from_message_classifies_network_errors() {
        assert_eq!(
            ToolError::from_message("request failed: connection reset").kind,
            ToolErrorKind::Transient
        );
        assert_eq!(
            ToolError::from_message("upstream HTTP 503").kind,
            ToolErrorKind::Transient
        );
        assert_eq!(
            ToolError::from_message("division by zero").kind,
            ToolErrorKind::Failed
        );
    }

    #[test]
    fn validation_coerces_and_fills_defaults() {
        let spec = ToolSpec::builder("convert", "")
            .param("value", ParamType::Number, "")
            .with_default("unit", ParamType::String, "celsius", "")
            .build();
        let mut args = Arguments::new();
        args.insert("value".into(), json!("21.5"));
        args.insert("extra".into(), json!(true));

        let out = validate_arguments(&spec, "t0", args).unwrap();
        assert_eq!(out["value"], json!(21.5));
        assert_eq!(out["unit"], json!("celsius"));
        assert_eq!(out["extra"], json!(true));
    }

    #[test]
    fn validation_reports_every_problem() {
        let spec = ToolSpec::builder("convert", "")
            .param("value", ParamType::Number, "")
            .param("from_unit", ParamType::String, "")
            .build();
        let mut args = Arguments::new();
        args.insert("value".into(), json!("warm"));

        match validate_arguments(&spec, "t3", args) {
            Err(AgentError::InvalidArguments {
                tool,
                call_id,
                problems,
            }) => {
                assert_eq!(tool, "convert");
                assert_eq!(call_id, "t3");
                assert_eq!(problems.len(), 2);
                assert!(problems[1].contains("from_unit"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("hi", 5), "hi");
    }
}
