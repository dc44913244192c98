//! Text-level repairs for malformed model output.
//!
//! Extraction helpers pull a candidate document out of surrounding prose
//! or markdown fences. Fix helpers correct the syntax defects models
//! commonly produce. All of them track JSON string state so that braces,
//! commas, and quotes inside string literals are left alone.

/// Body of the first fenced code block whose language is empty or `json`.
///
/// An unterminated fence yields everything after the opening line, which
/// covers responses cut off mid-block.
pub fn extract_fenced(text: &str) -> Option<String> {
    let mut in_fence = false;
    let mut json_fence = false;
    let mut buffer = String::new();

    for line in text.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("```") {
            if !in_fence {
                let lang = rest.trim().to_ascii_lowercase();
                json_fence = lang.is_empty() || lang == "json";
                in_fence = true;
                buffer.clear();
            } else {
                if json_fence && !buffer.trim().is_empty() {
                    return Some(buffer.trim().to_string());
                }
                in_fence = false;
                json_fence = false;
                buffer.clear();
            }
            continue;
        }
        if in_fence && json_fence {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }

    (in_fence && json_fence && !buffer.trim().is_empty()).then(|| buffer.trim().to_string())
}

/// Every top-level balanced `open ... close` span in `text`, in order.
///
/// Double-quoted strings are skipped, so delimiters inside them don't count.
pub fn balanced_spans(text: &str, open: char, close: char) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut depth = 0usize;
    let mut start = None;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' && depth > 0 {
            in_string = true;
        } else if ch == open {
            if depth == 0 {
                start = Some(idx);
            }
            depth += 1;
        } else if ch == close && depth > 0 {
            depth -= 1;
            if depth == 0
                && let Some(s) = start.take()
                && let Some(span) = text.get(s..idx + ch.len_utf8())
            {
                spans.push(span);
            }
        }
    }
    spans
}

/// Apply every syntax fix, in order: quote normalization, Python literals,
/// control characters inside strings, missing closers, trailing commas.
pub fn apply_syntax_fixes(text: &str) -> String {
    let fixed = normalize_quotes(text.trim());
    let fixed = replace_python_literals(&fixed);
    let fixed = escape_control_chars(&fixed);
    let fixed = close_unbalanced(&fixed);
    remove_trailing_commas(&fixed)
}

/// Rewrite single-quoted strings as double-quoted JSON strings.
///
/// Apostrophes inside double-quoted strings are untouched; double quotes
/// inside single-quoted strings are escaped.
pub fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escape = false;

    for ch in text.chars() {
        match quote {
            None => {
                if ch == '\'' {
                    quote = Some('\'');
                    out.push('"');
                } else {
                    if ch == '"' {
                        quote = Some('"');
                    }
                    out.push(ch);
                }
            }
            Some(q) => {
                if escape {
                    escape = false;
                    // `\'` is not a valid JSON escape.
                    if q == '\'' && ch == '\'' {
                        out.pop();
                    }
                    out.push(ch);
                } else if ch == '\\' {
                    escape = true;
                    out.push(ch);
                } else if ch == q {
                    quote = None;
                    out.push('"');
                } else if q == '\'' && ch == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}

/// Replace bare `True`, `False`, and `None` outside strings.
pub fn replace_python_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    let mut in_string = false;
    let mut escape = false;

    let flush = |word: &mut String, out: &mut String| {
        match word.as_str() {
            "True" => out.push_str("true"),
            "False" => out.push_str("false"),
            "None" => out.push_str("null"),
            w => out.push_str(w),
        }
        word.clear();
    };

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }
        flush(&mut word, &mut out);
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    flush(&mut word, &mut out);
    out
}

/// Escape raw newlines, carriage returns, and tabs inside strings.
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;

    for ch in text.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escape {
            escape = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escape = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Drop commas that directly precede a closing `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']') | None) {
                continue;
            }
        }
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    out
}

/// Close an unterminated string and any unclosed `{`/`[`, innermost first.
pub fn close_unbalanced(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escape {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
