//! Planning prompt assembly.
//!
//! [`PromptBuilder`] joins headed sections with blank lines.
//! [`planning_prompt`] uses it to lay out the instructions, the tool list,
//! the plan format, and finally the query, which always comes last on a
//! line starting with [`QUERY_MARKER`].

use crate::tools::spec::ToolSpec;

/// Prefix of the prompt's last line. The rest of that line is the query.
pub const QUERY_MARKER: &str = "Query: ";

const PREAMBLE: &str = "You are a planner. Decide which tools answer the query and reply with a \
JSON plan only. Steps run in order. A step can use an earlier step's result by writing that \
step's id (for example t0 or {t0}) inside an argument.";

const FORMAT: &str = r#"{"steps": [{"id": "t0", "tool": "<tool name>", "args": {...}}, ...], "final_answer": null}

If no tool is needed, reply {"steps": [], "final_answer": "<the answer>"}."#;

/// Builder for multi-section prompts.
///
/// Sections are joined with double newlines. Empty sections are skipped.
///
/// # Example
///
/// ```
/// use stepwise::agent::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("You are a planner.")
///     .section("Tools", "calc(expr: string)")
///     .section_if(false, "Hints", || "unused".into())
///     .build();
///
/// assert!(prompt.contains("## Tools"));
/// assert!(!prompt.contains("## Hints"));
/// ```
pub struct PromptBuilder {
    sections: Vec<String>,
}

impl PromptBuilder {
    /// Create a builder with a preamble, included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a section under a `## ` heading. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("## {heading}\n\n{content}"));
        }
        self
    }

    /// Conditionally append a section. `content_fn` only runs when
    /// `condition` holds.
    pub fn section_if(self, condition: bool, heading: &str, content_fn: impl FnOnce() -> String) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Append raw text without a heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// The prompt sent to the model for `query`.
pub fn planning_prompt(specs: &[&ToolSpec], query: &str) -> String {
    let tools = specs
        .iter()
        .map(|s| format!("- {}", s.to_description()))
        .collect::<Vec<_>>()
        .join("\n");

    PromptBuilder::new(PREAMBLE)
        .section_if(!specs.is_empty(), "Tools", || tools)
        .section("Plan format", FORMAT)
        .raw(format!("{QUERY_MARKER}{query}"))
        .build()
}

/// The query embedded in a prompt built by [`planning_prompt`], or the
/// whole prompt if it has no query line.
pub fn extract_query(prompt: &str) -> &str {
    prompt
        .rfind(QUERY_MARKER)
        .and_then(|i| prompt.get(i + QUERY_MARKER.len()..))
        .unwrap_or(prompt)
        .trim()
}
