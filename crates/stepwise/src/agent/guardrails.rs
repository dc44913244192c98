//! Input sanitation before planning and output shaping after execution.
//!
//! Both guards are pure: fixed configuration in, text out. They never retry
//! and never perform I/O.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use crate::agent::executor::Answer;
use crate::error::AgentError;
use crate::tools::spec::ParamType;

/// Default query length limit, in characters.
pub const DEFAULT_MAX_QUERY_CHARS: usize = 10_000;
/// Default answer length limit, in characters.
pub const DEFAULT_MAX_ANSWER_CHARS: usize = 2_000;
/// Default decimal places for numeric answers.
pub const DEFAULT_PRECISION: u32 = 2;
/// Appended to truncated answers.
pub const TRUNCATION_MARKER: &str = " …[truncated]";
/// Replacement for redacted spans.
pub const REDACTED: &str = "[REDACTED]";

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern compiles")
});

static CONTROL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|[^|>]*\|>|\[/?INST\]").expect("control token pattern compiles")
});

static DEFAULT_DENYLIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Provider API keys
        r"\bsk-[A-Za-z0-9_-]{16,}",
        // AWS access keys
        r"AKIA[0-9A-Z]{16}",
        // key = value credentials
        r#"(?i)\b(api[_-]?key|password|passwd|secret|token)\s*[=:]\s*["']?[^\s"',;]+["']?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("denylist pattern compiles"))
    .collect()
});

// ── InputGuard ─────────────────────────────────────────────────────

/// Cleans a raw query before it reaches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputGuard {
    /// Longest accepted query, in characters (after trimming).
    pub max_chars: usize,
}

impl Default for InputGuard {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_QUERY_CHARS,
        }
    }
}

impl InputGuard {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Sanitize `query`.
    ///
    /// Removes `<script>` blocks and chat-template control tokens, defuses
    /// code fences, drops control characters, and collapses whitespace.
    pub fn sanitize(&self, query: &str) -> Result<String, AgentError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(AgentError::EmptyInput);
        }
        let len = trimmed.chars().count();
        if len > self.max_chars {
            return Err(AgentError::InputTooLong {
                len,
                max: self.max_chars,
            });
        }

        let text = SCRIPT_BLOCK.replace_all(trimmed, " ");
        let text = CONTROL_TOKEN.replace_all(&text, " ");
        let text = text.replace("```", "'''");
        let text: String = text
            .chars()
            .filter(|c| c.is_whitespace() || !c.is_control())
            .collect();
        let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if cleaned.is_empty() {
            return Err(AgentError::EmptyInput);
        }
        Ok(cleaned)
    }
}

// ── OutputGuard ────────────────────────────────────────────────────

/// Shapes an [`Answer`] before it is returned to the caller.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    /// Decimal places kept for numeric answers.
    pub precision: u32,
    /// Longest answer text, in characters, before truncation.
    pub max_chars: usize,
    /// Patterns replaced with [`REDACTED`].
    pub denylist: Vec<Regex>,
}

impl Default for OutputGuard {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_chars: DEFAULT_MAX_ANSWER_CHARS,
            denylist: DEFAULT_DENYLIST.clone(),
        }
    }
}

impl OutputGuard {
    /// Add a redaction pattern (builder pattern).
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.denylist.push(pattern);
        self
    }

    /// Apply type enforcement, redaction, and truncation, in that order.
    ///
    /// `expected` is the output type declared by the tool that produced the
    /// answer, if any. When it is numeric the answer must be a number or a
    /// numeric string.
    pub fn apply(&self, answer: Answer, expected: Option<ParamType>) -> Result<Answer, AgentError> {
        let Answer {
            text,
            source,
            value,
        } = answer;

        let expects_number = matches!(expected, Some(ParamType::Number | ParamType::Integer));
        let numeric = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if expects_number => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        let (text, value) = match numeric {
            Some(x) if !x.is_finite() => {
                return Err(AgentError::OutputPolicy {
                    reason: format!("numeric answer is not finite: {text}"),
                });
            }
            Some(x) => {
                let rounded = round_to(x, self.precision);
                let value = Number::from_f64(rounded).map(Value::Number).unwrap_or(value);
                (format_number(x, self.precision), value)
            }
            None if expects_number => {
                return Err(AgentError::OutputPolicy {
                    reason: format!("expected a number, got '{}'", crate::tools::core::preview(&text, 80)),
                });
            }
            None => (text, value),
        };

        let text = self.redact(&text);
        let text = self.truncate(text);
        Ok(Answer {
            text,
            source,
            value,
        })
    }

    /// Replace every denylist match with [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.denylist {
            result = pattern.replace_all(&result, REDACTED).into_owned();
        }
        result
    }

    fn truncate(&self, text: String) -> String {
        if text.chars().count() <= self.max_chars {
            return text;
        }
        let mut out: String = text.chars().take(self.max_chars).collect();
        out.push_str(TRUNCATION_MARKER);
        out
    }
}

fn round_to(x: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (x * factor).round() / factor
}

/// Round `x` to `precision` decimals and drop trailing zeros.
///
/// `30.375` with precision 2 gives `"30.38"`, `4.0` gives `"4"`.
pub fn format_number(x: f64, precision: u32) -> String {
    let rendered = format!("{:.*}", precision as usize, round_to(x, precision));
    let trimmed = if rendered.contains('.') {
        rendered.trim_end_matches('0').trim_end_matches('.')
    } else {
        rendered.as_str()
    };
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
