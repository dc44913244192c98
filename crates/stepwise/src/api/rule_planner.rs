//! A deterministic planner for the built-in tool set.
//!
//! [`RulePlanner`] stands in for a real model in demos, the CLI, and tests.
//! It reads the query off the planning prompt, matches it against a fixed
//! list of rules, and answers with a canonical JSON plan. Queries no rule
//! matches get a plain-prose reply, which the parser takes as a direct
//! answer.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::agent::prompt::extract_query;
use crate::api::llm::{LlmClient, LlmFuture};
use crate::tools::spec::ToolSpec;

const CITIES: &[&str] = &[
    "paris",
    "london",
    "dhaka",
    "amsterdam",
    "new york",
    "tokyo",
    "sydney",
    "berlin",
];

const WEATHER_WORDS: &[&str] = &[
    "weather",
    "temperature",
    "forecast",
    "climate",
    "rain",
    "snow",
    "sunny",
    "cloudy",
];

const KB_PREFIXES: &[&str] = &[
    "who is",
    "who was",
    "what is",
    "tell me about",
    "information about",
];

static ADD_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\badd\s+(-?\d+(?:\.\d+)?)").expect("add pattern compiles"));

static CONVERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bconvert\s+(-?\d+(?:\.\d+)?)\s*(?:degrees?\s+)?([a-z]+)\s+(?:to|into|in)\s+(?:degrees?\s+)?([a-z]+)",
    )
    .expect("convert pattern compiles")
});

static TRANSLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\btranslate\s+['"]([^'"]+)['"](?:\s+from\s+(\w+))?\s+(?:to|into)\s+(\w+)"#)
        .expect("translate pattern compiles")
});

static ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d\s*(?:[+\-*/^]|%\s*of)\s*\(?\s*-?\d").expect("arithmetic pattern compiles")
});

static MATH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:what\s+is|what's|calculate|compute|evaluate)\s*").expect("prefix pattern compiles")
});

static IN_PLACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bin\s+([a-z]+)").expect("place pattern compiles"));

/// Rule-based stand-in for a planning model.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePlanner;

impl RulePlanner {
    pub fn new() -> Self {
        Self
    }

    /// The reply for `query`: a canonical plan document, or prose.
    pub fn plan_for(&self, query: &str) -> String {
        let query = query.trim();
        let lower = query.to_lowercase();

        if let Some(plan) = average_temperature(&lower) {
            return plan;
        }
        if let Some(plan) = conversion(query) {
            return plan;
        }
        if let Some(plan) = translation(query) {
            return plan;
        }
        if is_math(&lower) {
            let expr = MATH_PREFIX.replace(query, "");
            let expr = expr.trim().trim_end_matches('?').trim();
            return single_step("calc", json!({ "expr": expr }));
        }
        if WEATHER_WORDS.iter().any(|w| lower.contains(w)) {
            return single_step("weather", json!({ "city": city_in(&lower) }));
        }
        if lower.contains("quote") {
            let args = ["tech", "motivation", "general"]
                .iter()
                .find(|c| lower.contains(*c))
                .map(|c| json!({ "category": c }))
                .unwrap_or_else(|| json!({}));
            return single_step("random_quote", args);
        }
        if let Some(prefix) = KB_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
            let subject = query
                .get(prefix.len()..)
                .unwrap_or_default()
                .trim()
                .trim_end_matches('?')
                .trim();
            return single_step("kb", json!({ "q": subject }));
        }

        format!("I don't understand the query: {query}")
    }
}

impl LlmClient for RulePlanner {
    fn complete<'a>(&'a self, prompt: &'a str, _tools: &'a [&'a ToolSpec]) -> LlmFuture<'a> {
        let reply = self.plan_for(extract_query(prompt));
        Box::pin(async move { Ok(reply) })
    }

    fn name(&self) -> &str {
        "rule_planner"
    }
}

// ── Rules ──────────────────────────────────────────────────────────

fn single_step(tool: &str, args: Value) -> String {
    json!({
        "steps": [{ "id": "t0", "tool": tool, "args": args }],
        "final_answer": null,
    })
    .to_string()
}

/// Known cities in order of appearance.
fn cities_in(lower: &str) -> Vec<&'static str> {
    let mut found: Vec<(usize, &'static str)> = CITIES
        .iter()
        .filter_map(|c| lower.find(c).map(|i| (i, *c)))
        .collect();
    found.sort_unstable();
    found.into_iter().map(|(_, c)| c).collect()
}

fn city_in(lower: &str) -> String {
    let city = cities_in(lower)
        .first()
        .map(|c| c.to_string())
        .or_else(|| IN_PLACE.captures(lower).map(|caps| caps[1].to_string()))
        .unwrap_or_else(|| "paris".to_string());
    title_case(&city)
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One `weather` step per city, then a `calc` step averaging them.
fn average_temperature(lower: &str) -> Option<String> {
    let cities = cities_in(lower);
    let weather_asked = WEATHER_WORDS.iter().any(|w| lower.contains(w));
    if cities.len() < 2 || !lower.contains("average") || !weather_asked {
        return None;
    }

    let mut steps: Vec<Value> = cities
        .iter()
        .enumerate()
        .map(|(i, c)| json!({ "id": format!("t{i}"), "tool": "weather", "args": { "city": title_case(c) } }))
        .collect();

    let sum = (0..cities.len())
        .map(|i| format!("t{i}"))
        .collect::<Vec<_>>()
        .join("+");
    let mut expr = format!("({sum})/{}", cities.len());
    if let Some(caps) = ADD_N.captures(lower) {
        expr.push('+');
        expr.push_str(&caps[1]);
    }
    steps.push(json!({
        "id": format!("t{}", cities.len()),
        "tool": "calc",
        "args": { "expr": expr },
    }));

    Some(json!({ "steps": steps, "final_answer": null }).to_string())
}

fn conversion(query: &str) -> Option<String> {
    let caps = CONVERT.captures(query)?;
    let value: f64 = caps[1].parse().ok()?;
    Some(single_step(
        "unit_converter",
        json!({
            "value": value,
            "from_unit": caps[2].to_lowercase(),
            "to_unit": caps[3].to_lowercase(),
        }),
    ))
}

fn translation(query: &str) -> Option<String> {
    let caps = TRANSLATE.captures(query)?;
    let mut args = Map::new();
    args.insert("text".into(), json!(&caps[1]));
    args.insert(
        "from_lang".into(),
        json!(caps.get(2).map_or("auto".to_string(), |m| m.as_str().to_lowercase())),
    );
    args.insert("to_lang".into(), json!(caps[3].to_lowercase()));
    Some(single_step("translator", Value::Object(args)))
}

fn is_math(lower: &str) -> bool {
    let has_digit = lower.chars().any(|c| c.is_ascii_digit());
    let worded = MATH_PREFIX.is_match(lower) && has_digit;
    let about_weather = WEATHER_WORDS.iter().any(|w| lower.contains(w)) || lower.contains("average");
    (worded || ARITHMETIC.is_match(lower)) && !about_weather
}
