//! Raw model text to [`Plan`]: strict first, then loose.
//!
//! The strict phase accepts exactly one canonical plan document:
//!
//! ```json
//! {"steps": [{"id": "t0", "tool": "calc", "args": {"expr": "2+2"}}],
//!  "final_answer": null}
//! ```
//!
//! `id`, `args`, and `final_answer` are optional; any other field is
//! rejected. When the strict phase fails, the loose phases run in the fixed
//! order of [`ParsePhase::ALL`], each returning a plan or "not handled":
//!
//! | Phase | Accepts |
//! |-------|---------|
//! | `fenced_block` | a canonical document inside a ```` ```json ```` fence |
//! | `embedded_object` | a canonical document inside explanatory prose |
//! | `syntax_fixes` | single quotes, trailing commas, raw newlines, missing closers |
//! | `legacy_shape` | `{"tool", "args"}`, a bare step array, or `{"plan": [...]}` |
//! | `tool_directive` | `TOOL:name KEY="value"` lines |
//! | `direct_answer` | prose holding no fence or JSON document, taken verbatim |
//!
//! The parser never consults the tool registry: a plan naming an unknown
//! tool parses fine and fails at execution.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::PlanParseError;
use crate::plan::repair::{apply_syntax_fixes, balanced_spans, extract_fenced, normalize_quotes};
use crate::plan::{ParsePhase, Plan, ToolCall, default_step_id};
use crate::tools::core::preview;

// ── Canonical document ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanDocument {
    #[serde(default)]
    steps: Vec<StepDocument>,
    #[serde(default)]
    final_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDocument {
    #[serde(default)]
    id: Option<String>,
    tool: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

/// Parse a canonical plan document, or explain why it isn't one.
pub fn parse_canonical(text: &str) -> Result<Plan, String> {
    let doc: PlanDocument = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;
    let steps = doc
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| ToolCall {
            id: s.id.unwrap_or_else(|| default_step_id(i)),
            tool_name: s.tool,
            arguments: s.args.unwrap_or_default(),
        })
        .collect();
    let plan = Plan {
        steps,
        final_answer_template: doc.final_answer,
    };
    plan.check_shape()?;
    Ok(plan)
}

// ── PlanParser ─────────────────────────────────────────────────────

/// A plan together with the phase that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub phase: ParsePhase,
}

/// Turns model output into a [`Plan`].
///
/// # Example
///
/// ```ignore
/// let parser = PlanParser::new();
/// let plan = parser.parse("```json\n{\"steps\": [{\"tool\": \"calc\", \"args\": {\"expr\": \"2+2\"}}]}\n```")?;
/// assert_eq!(plan.steps[0].id, "t0");
/// ```
#[derive(Debug, Clone)]
pub struct PlanParser {
    loose: bool,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self { loose: true }
    }
}

impl PlanParser {
    /// A parser with every phase enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parser that only accepts canonical documents.
    pub fn strict_only() -> Self {
        Self { loose: false }
    }

    /// Parse `text` into a plan.
    pub fn parse(&self, text: &str) -> Result<Plan, PlanParseError> {
        self.parse_with_phase(text).map(|p| p.plan)
    }

    /// Parse `text`, reporting which phase succeeded.
    pub fn parse_with_phase(&self, text: &str) -> Result<ParsedPlan, PlanParseError> {
        let mut attempted = Vec::new();
        let phases: &[ParsePhase] = if self.loose {
            &ParsePhase::ALL
        } else {
            &[ParsePhase::Strict]
        };

        for &phase in phases {
            attempted.push(phase);
            if let Some(plan) = run_phase(phase, text) {
                debug!("Plan parsed via {phase}: {plan}");
                return Ok(ParsedPlan { plan, phase });
            }
            trace!("Parse phase {phase} did not handle the output");
        }

        debug!("No parse phase handled model output: {}", preview(text, 200));
        Err(PlanParseError {
            raw: text.to_string(),
            attempted,
        })
    }
}

fn run_phase(phase: ParsePhase, text: &str) -> Option<Plan> {
    match phase {
        ParsePhase::Strict => parse_canonical(text).ok(),
        ParsePhase::FencedBlock => extract_fenced(text).and_then(|body| parse_canonical(&body).ok()),
        ParsePhase::EmbeddedObject => balanced_spans(text, '{', '}')
            .into_iter()
            .find_map(|span| parse_canonical(span).ok()),
        ParsePhase::SyntaxFixes => repair_candidates(text)
            .iter()
            .find_map(|c| parse_canonical(&apply_syntax_fixes(c)).ok()),
        ParsePhase::LegacyShape => legacy_plan(text),
        ParsePhase::ToolDirective => directive_plan(text),
        ParsePhase::DirectAnswer => direct_plan(text),
    }
}

/// Substrings worth running syntax fixes on: the fence body, every balanced
/// object in the raw text and in the quote-normalized text, then the text
/// from the first `{` onward for output that was cut off.
fn repair_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(body) = extract_fenced(text) {
        push_unique(&mut candidates, &body);
    }
    for span in balanced_spans(text, '{', '}') {
        push_unique(&mut candidates, span);
    }
    let normalized = normalize_quotes(text);
    for span in balanced_spans(&normalized, '{', '}') {
        push_unique(&mut candidates, span);
    }
    if let Some(start) = text.find('{')
        && let Some(rest) = text.get(start..)
    {
        push_unique(&mut candidates, rest);
    }
    candidates
}

fn push_unique(candidates: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if !candidate.is_empty() && !candidates.iter().any(|c| c == candidate) {
        candidates.push(candidate.to_string());
    }
}

// ── Legacy shapes ──────────────────────────────────────────────────

const TOOL_KEYS: [&str; 4] = ["tool", "tool_name", "name", "function"];
const ARG_KEYS: [&str; 4] = ["args", "arguments", "parameters", "input"];

/// Every JSON value recoverable from `text`, raw or repaired.
fn json_candidates(text: &str) -> Vec<Value> {
    let mut sources: Vec<String> = vec![text.trim().to_string()];
    if let Some(body) = extract_fenced(text) {
        sources.push(body);
    }
    sources.extend(balanced_spans(text, '{', '}').into_iter().map(String::from));
    sources.extend(balanced_spans(text, '[', ']').into_iter().map(String::from));
    sources.extend(repair_candidates(text).iter().map(|c| apply_syntax_fixes(c)));

    sources
        .iter()
        .filter_map(|s| serde_json::from_str::<Value>(s).ok())
        .filter(|v| v.is_object() || v.is_array())
        .collect()
}

fn legacy_plan(text: &str) -> Option<Plan> {
    json_candidates(text).into_iter().find_map(|value| {
        let plan = normalize_legacy(&value)?;
        plan.check_shape().ok()?;
        Some(plan)
    })
}

fn normalize_legacy(value: &Value) -> Option<Plan> {
    match value {
        Value::Array(items) => steps_from_array(items).map(Plan::from_steps),
        Value::Object(obj) => {
            let final_answer = ["final_answer", "answer"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(String::from);
            let steps = if let Some(Value::Array(items)) = obj.get("plan").or_else(|| obj.get("steps")) {
                steps_from_array(items)?
            } else if has_tool_key(obj) {
                vec![legacy_step(obj, 0)?]
            } else if final_answer.is_some() {
                Vec::new()
            } else {
                return None;
            };
            Some(Plan {
                steps,
                final_answer_template: final_answer,
            })
        }
        _ => None,
    }
}

fn has_tool_key(obj: &Map<String, Value>) -> bool {
    TOOL_KEYS.iter().any(|k| obj.get(*k).is_some_and(Value::is_string))
}

fn steps_from_array(items: &[Value]) -> Option<Vec<ToolCall>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| legacy_step(item.as_object()?, i))
        .collect()
}

fn legacy_step(obj: &Map<String, Value>, index: usize) -> Option<ToolCall> {
    let tool = TOOL_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))?;
    let arguments = match ARG_KEYS.iter().find_map(|k| obj.get(*k)) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        // Function-calling APIs send arguments as a JSON-encoded string.
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => return None,
        },
        Some(_) => return None,
    };
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default_step_id(index));
    Some(ToolCall::new(id, tool, arguments))
}

// ── Directives and prose ───────────────────────────────────────────

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*TOOL:\s*([A-Za-z_][\w-]*)[ \t]*(.*)$").expect("directive pattern compiles")
});

static DIRECTIVE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_]\w*)\s*=\s*(?:"([^"]*)"|'([^']*)'|(\S+))"#)
        .expect("directive argument pattern compiles")
});

fn directive_plan(text: &str) -> Option<Plan> {
    let steps: Vec<ToolCall> = DIRECTIVE
        .captures_iter(text)
        .enumerate()
        .map(|(i, caps)| {
            let tool = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let arguments = DIRECTIVE_ARG
                .captures_iter(rest)
                .filter_map(|a| {
                    let key = a.get(1)?.as_str().to_lowercase();
                    let value = (2..=4).find_map(|g| a.get(g))?.as_str();
                    Some((key, Value::String(value.to_string())))
                })
                .collect();
            ToolCall::new(default_step_id(i), tool, arguments)
        })
        .collect();
    if steps.is_empty() {
        return None;
    }
    let plan = Plan::from_steps(steps);
    plan.check_shape().ok()?;
    Some(plan)
}

fn direct_plan(text: &str) -> Option<Plan> {
    if text.trim().is_empty()
        || text.contains("```")
        || json_candidates(text).iter().any(is_document)
    {
        return None;
    }
    Some(Plan::direct(text))
}

/// A non-empty object, or an array holding an object. Bracketed prose such
/// as `see [1]` is not a document.
fn is_document(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}
