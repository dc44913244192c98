//! Plans: ordered tool calls with inter-step placeholders.
//!
//! | Item | Role |
//! |------|------|
//! | [`Plan`], [`ToolCall`] | The parsed plan and its steps |
//! | [`parser::PlanParser`] | Raw model text to [`Plan`], strict then loose |
//! | [`repair`] | Text-level fixes used by the loose phase |
//! | [`find_references`] | Placeholder scanning shared with the executor |
//!
//! A step's arguments may refer to an earlier step's result by its id, in
//! any of these forms: `t0`, `{t0}`, `{{t0}}`, `${t0}`. A token counts as a
//! reference when it is a step id declared in the plan or has the default
//! id shape `t<digits>`.

pub mod parser;
pub mod repair;

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the plan. Defaults to `t<index>`.
    pub id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// An ordered sequence of tool calls, or a direct answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<ToolCall>,
    /// The answer text of a zero-step plan.
    pub final_answer_template: Option<String>,
}

impl Plan {
    /// A zero-step plan answering with `text` verbatim.
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            final_answer_template: Some(text.into()),
        }
    }

    /// A plan from steps, no template.
    pub fn from_steps(steps: Vec<ToolCall>) -> Self {
        Self {
            steps,
            final_answer_template: None,
        }
    }

    /// Whether this plan answers without running any tool.
    pub fn is_direct(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the structural rules every plan must satisfy.
    ///
    /// Step ids must be non-empty and unique, tool names non-empty, and a
    /// zero-step plan must carry a non-empty template. Tool existence and
    /// reference ordering are checked at execution time.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return match &self.final_answer_template {
                Some(t) if !t.trim().is_empty() => Ok(()),
                _ => Err("plan has no steps and no final answer".into()),
            };
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err("step id is empty".into());
            }
            if step.tool_name.trim().is_empty() {
                return Err(format!("step {} has no tool name", step.id));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(format!("duplicate step id '{}'", step.id));
            }
        }
        Ok(())
    }

    /// Ids declared by the steps, in order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(
                f,
                "direct: {}",
                self.final_answer_template.as_deref().unwrap_or_default()
            );
        }
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|s| format!("{}={}({})", s.id, s.tool_name, Value::Object(s.arguments.clone())))
            .collect();
        f.write_str(&steps.join(" -> "))
    }
}

/// Default id for the step at `index`.
pub fn default_step_id(index: usize) -> String {
    format!("t{index}")
}

// ── ParsePhase ─────────────────────────────────────────────────────

/// The parser phases, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePhase {
    /// The whole text is a canonical plan document.
    Strict,
    /// A fenced code block holds a canonical plan document.
    FencedBlock,
    /// A balanced `{...}` object inside prose is a canonical plan document.
    EmbeddedObject,
    /// A candidate parses after quote, comma, newline, and closer fixes.
    SyntaxFixes,
    /// A single-call object, bare step array, or `{"plan": [...]}`.
    LegacyShape,
    /// `TOOL:name KEY="value"` lines.
    ToolDirective,
    /// Plain prose taken as the answer itself.
    DirectAnswer,
}

impl ParsePhase {
    /// All phases in precedence order.
    pub const ALL: [ParsePhase; 7] = [
        ParsePhase::Strict,
        ParsePhase::FencedBlock,
        ParsePhase::EmbeddedObject,
        ParsePhase::SyntaxFixes,
        ParsePhase::LegacyShape,
        ParsePhase::ToolDirective,
        ParsePhase::DirectAnswer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParsePhase::Strict => "strict",
            ParsePhase::FencedBlock => "fenced_block",
            ParsePhase::EmbeddedObject => "embedded_object",
            ParsePhase::SyntaxFixes => "syntax_fixes",
            ParsePhase::LegacyShape => "legacy_shape",
            ParsePhase::ToolDirective => "tool_directive",
            ParsePhase::DirectAnswer => "direct_answer",
        }
    }

    /// Whether the phase belongs to the loose (repair) phase.
    pub fn is_repair(self) -> bool {
        self != ParsePhase::Strict
    }
}

impl fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── References ─────────────────────────────────────────────────────

/// `${id}`, `{{id}}`, `{id}`, or a bare identifier.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}|\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}|\b([A-Za-z_][A-Za-z0-9_]*)\b")
        .expect("reference pattern compiles")
});

static DEFAULT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^t\d+$").expect("default id pattern compiles"));

/// A placeholder occurrence inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The referenced step id.
    pub id: String,
    /// Byte range of the whole occurrence, including any braces.
    pub start: usize,
    pub end: usize,
}

/// Find every step reference in `text`.
///
/// `declared` is the set of ids the plan declares. A bare token refers to a
/// step only when it is declared. A braced token (`{t3}`, `{{t3}}`, `${t3}`)
/// also counts when it is shaped like a default id, so a reference to a
/// missing step still surfaces as an error.
pub fn find_references(text: &str, declared: &HashSet<&str>) -> Vec<Reference> {
    REFERENCE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (braced, id) = match (1..=3).find_map(|i| caps.get(i)) {
                Some(m) => (true, m.as_str()),
                None => (false, caps.get(4)?.as_str()),
            };
            is_reference_token(id, braced, declared).then(|| Reference {
                id: id.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Whether `token` names a step.
pub fn is_reference_token(token: &str, braced: bool, declared: &HashSet<&str>) -> bool {
    declared.contains(token) || (braced && DEFAULT_ID.is_match(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn direct_plan_shape() {
        assert!(Plan::direct("Hello").check_shape().is_ok());
        assert!(Plan::direct("  ").check_shape().is_err());
        assert!(Plan::default().check_shape().is_err());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let plan = Plan::from_steps(vec![
            ToolCall::new("a", "calc", args(json!({"expr": "1"}))),
            ToolCall::new("a", "calc", args(json!({"expr": "2"}))),
        ]);
        assert_eq!(plan.check_shape(), Err("duplicate step id 'a'".to_string()));
    }

    #[test]
    fn display_is_compact() {
        let plan = Plan::from_steps(vec![ToolCall::new("t0", "weather", args(json!({"city": "Paris"})))]);
        assert_eq!(plan.to_string(), r#"t0=weather({"city":"Paris"})"#);
    }

    #[test]
    fn references_in_every_form() {
        let declared: HashSet<&str> = ["t0"].into_iter().collect();
        let text = "(t0+{t1})/2 + {{t2}} - ${t3}";
        let refs = find_references(text, &declared);
        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3"]);
        assert_eq!(text.get(refs[1].start..refs[1].end), Some("{t1}"));
        assert_eq!(text.get(refs[3].start..refs[3].end), Some("${t3}"));
    }

    #[test]
    fn custom_ids_only_when_declared() {
        let declared: HashSet<&str> = ["paris"].into_iter().collect();
        let refs = find_references("paris plus london", &declared);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "paris");
        assert!(find_references("tea time", &HashSet::new()).is_empty());
        assert!(find_references("t0x", &HashSet::new()).is_empty());
    }

    #[test]
    fn bare_default_ids_need_a_declared_step() {
        let declared: HashSet<&str> = ["t0"].into_iter().collect();
        assert!(find_references("hola t1", &declared).is_empty());
        assert_eq!(find_references("t0 and {t1}", &declared).len(), 2);
    }
}
