//! Built-in tools.
//!
//! Deterministic tools that need no network access. They back the CLI and
//! the end-to-end tests and double as reference implementations of [`Tool`].
//!
//! # Available tools
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`Calculator`] | `calc` | Arithmetic and percentages |
//! | [`Weather`] | `weather` | Static temperature table |
//! | [`KnowledgeBaseTool`] | `kb` | Look up a person or topic |
//! | [`UnitConverter`] | `unit_converter` | Temperature, length, mass |
//! | [`Translator`] | `translator` | Tiny phrase table |
//! | [`RandomQuote`] | `random_quote` | Rotating quotes |
//!
//! # Example
//!
//! ```ignore
//! let registry = ToolRegistry::new()
//!     .with_builtin_tools_using(KnowledgeBase::from_path("data/kb.json")?)?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::AgentError;
use crate::tools::core::{Arguments, Tool, ToolError, ToolFuture, ToolRegistry};
use crate::tools::spec::{ParamType, ToolSpec};

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `calc`.
#[derive(Deserialize, JsonSchema)]
pub struct CalcArgs {
    /// Arithmetic expression, e.g. '(18+17)/2' or '12.5% of 243'.
    pub expr: String,
}

/// Typed arguments for `weather`.
#[derive(Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// City name, e.g. 'Paris'.
    pub city: String,
}

/// Typed arguments for `kb`.
#[derive(Deserialize, JsonSchema)]
pub struct KbArgs {
    /// Name or topic to look up, e.g. 'Ada Lovelace'.
    pub q: String,
}

/// Typed arguments for `unit_converter`.
#[derive(Deserialize, JsonSchema)]
pub struct ConvertArgs {
    /// Value to convert.
    pub value: f64,
    /// Unit to convert from, e.g. 'celsius', 'km', 'lb'.
    pub from_unit: String,
    /// Unit to convert to, e.g. 'fahrenheit', 'mi', 'kg'.
    pub to_unit: String,
}

/// Typed arguments for `translator`.
#[derive(Deserialize, JsonSchema)]
pub struct TranslateArgs {
    /// Text to translate.
    pub text: String,
    /// Source language ('auto' to detect).
    #[serde(default = "default_from_lang")]
    pub from_lang: String,
    /// Target language.
    #[serde(default = "default_to_lang")]
    pub to_lang: String,
}

fn default_from_lang() -> String {
    "auto".into()
}

fn default_to_lang() -> String {
    "english".into()
}

/// Typed arguments for `random_quote`.
#[derive(Deserialize, JsonSchema)]
pub struct QuoteArgs {
    /// One of 'general', 'tech', 'motivation'.
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".into()
}

fn parse_args<T: DeserializeOwned>(arguments: &Arguments) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| ToolError::invalid_input(format!("invalid tool arguments: {e}")))
}

/// Integral values as JSON integers, everything else as floats.
fn number_value(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 9.0e15 {
        Value::from(x as i64)
    } else {
        Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ── Calculator ─────────────────────────────────────────────────────

static PERCENT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\s*%\s*of\s*(-?\d+(?:\.\d+)?)$").expect("percent-of pattern compiles")
});

static ADD_TO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^add\s+(.+?)\s+to\s+(.+)$").expect("add-to pattern compiles"));

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent pattern compiles"));

const FILLER: &[&str] = &["what is", "what's", "calculate", "compute", "evaluate"];

const OPERATOR_WORDS: &[(&str, &str)] = &[
    (" plus ", " + "),
    (" minus ", " - "),
    (" multiplied by ", " * "),
    (" times ", " * "),
    (" divided by ", " / "),
];

/// Evaluates arithmetic with `meval`.
///
/// Accepts plain expressions, `X% of Y`, `add X to Y`, and the operator
/// words plus/minus/times/divided by. A `%` after a number means percent.
#[derive(Debug)]
pub struct Calculator {
    spec: ToolSpec,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::builder("calc", "Evaluate an arithmetic expression, including percentages")
                .parameters_for::<CalcArgs>()
                .returns(ParamType::Number)
                .example(r#"{"expr": "12.5% of 243"}"#, "30.375")
                .example(r#"{"expr": "(t0+t1)/2"}"#, "average of two earlier results")
                .build(),
        }
    }
}

/// Rewrite `expr` into something `meval` understands.
pub fn normalize_expression(expr: &str) -> String {
    let mut e = expr.to_lowercase();
    for filler in FILLER {
        e = e.replace(filler, " ");
    }
    let e = e.trim().trim_end_matches('?').trim().to_string();

    if let Some(caps) = PERCENT_OF.captures(&e) {
        return format!("{}/100*{}", &caps[1], &caps[2]);
    }
    let e = match ADD_TO.captures(&e) {
        Some(caps) => format!("({}) + ({})", &caps[2], &caps[1]),
        None => e,
    };
    let mut padded = format!(" {e} ");
    for (word, op) in OPERATOR_WORDS {
        padded = padded.replace(word, op);
    }
    PERCENT.replace_all(padded.trim(), "($1/100)").into_owned()
}

/// Evaluate `expr` to a finite number.
pub fn evaluate(expr: &str) -> Result<f64, ToolError> {
    let normalized = normalize_expression(expr);
    if normalized.is_empty() {
        return Err(ToolError::invalid_input("empty expression"));
    }
    let value = meval::eval_str(&normalized).map_err(|e| {
        ToolError::invalid_input(format!("Invalid mathematical expression: {expr} ({e})"))
    })?;
    if !value.is_finite() {
        return Err(ToolError::invalid_input(format!(
            "expression has no finite value: {expr}"
        )));
    }
    Ok(value)
}

impl Tool for Calculator {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let args = parse_args::<CalcArgs>(arguments);
        Box::pin(async move {
            let expr = args?.expr;
            debug!("calc: evaluating {expr:?}");
            tokio::task::spawn_blocking(move || evaluate(&expr))
                .await
                .map_err(|e| ToolError::failed(format!("calculation task failed: {e}")))?
                .map(number_value)
        })
    }
}

// ── Weather ────────────────────────────────────────────────────────

/// Default temperature for cities missing from the table.
pub const DEFAULT_TEMPERATURE: f64 = 20.0;

/// Temperatures in °C from a static table.
#[derive(Debug)]
pub struct Weather {
    spec: ToolSpec,
    table: Vec<(&'static str, f64)>,
}

impl Default for Weather {
    fn default() -> Self {
        Self::new()
    }
}

impl Weather {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::builder("weather", "Current temperature in °C for a city")
                .parameters_for::<WeatherArgs>()
                .returns(ParamType::Number)
                .example(r#"{"city": "Paris"}"#, "18")
                .build(),
            table: vec![
                ("paris", 18.0),
                ("london", 17.0),
                ("dhaka", 31.0),
                ("amsterdam", 19.5),
            ],
        }
    }

    pub fn temperature(&self, city: &str) -> f64 {
        let city = city.trim().to_lowercase();
        self.table
            .iter()
            .find(|(name, _)| *name == city)
            .map_or(DEFAULT_TEMPERATURE, |(_, t)| *t)
    }
}

impl Tool for Weather {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let result = parse_args::<WeatherArgs>(arguments).map(|a| number_value(self.temperature(&a.city)));
        Box::pin(async move { result })
    }
}

// ── Knowledge base ─────────────────────────────────────────────────

/// Reply when no entry matches.
pub const NO_ENTRY: &str = "No entry found.";

/// One knowledge base entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbEntry {
    pub name: String,
    pub summary: String,
}

/// A list of named summaries, loaded from `{"entries": [...]}` JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub entries: Vec<KbEntry>,
}

/// Error loading a knowledge base file.
#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("cannot read knowledge base {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid knowledge base {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let entry = |name: &str, summary: &str| KbEntry {
            name: name.into(),
            summary: summary.into(),
        };
        Self {
            entries: vec![
                entry(
                    "Ada Lovelace",
                    "Ada Lovelace (1815-1852) was an English mathematician who wrote the first \
                     published algorithm intended for Charles Babbage's Analytical Engine.",
                ),
                entry(
                    "Alan Turing",
                    "Alan Turing (1912-1954) was an English mathematician and computer scientist \
                     who formalised computation with the Turing machine.",
                ),
                entry(
                    "Grace Hopper",
                    "Grace Hopper (1906-1992) was an American computer scientist and US Navy \
                     rear admiral who built one of the first compilers.",
                ),
            ],
        }
    }
}

impl KnowledgeBase {
    /// Load a knowledge base from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KnowledgeBaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| KnowledgeBaseError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Summary of the first entry whose name contains the query, or is
    /// contained in it. Case-insensitive.
    pub fn lookup(&self, query: &str) -> Option<&str> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| {
                let name = e.name.to_lowercase();
                !name.is_empty() && (name.contains(&query) || query.contains(&name))
            })
            .map(|e| e.summary.as_str())
    }
}

/// The `kb` tool.
#[derive(Debug)]
pub struct KnowledgeBaseTool {
    spec: ToolSpec,
    kb: KnowledgeBase,
}

impl KnowledgeBaseTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            spec: ToolSpec::builder("kb", "Look up a person or topic in the knowledge base")
                .parameters_for::<KbArgs>()
                .returns(ParamType::String)
                .example(r#"{"q": "Ada Lovelace"}"#, "a short biography")
                .build(),
            kb,
        }
    }
}

impl Tool for KnowledgeBaseTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let result = parse_args::<KbArgs>(arguments)
            .map(|a| Value::String(self.kb.lookup(&a.q).unwrap_or(NO_ENTRY).to_string()));
        Box::pin(async move { result })
    }
}

// ── Unit converter ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Celsius,
    Fahrenheit,
    Kelvin,
    Kilometer,
    Mile,
    Meter,
    Foot,
    Kilogram,
    Pound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Temperature,
    Length,
    Mass,
}

impl Unit {
    fn parse(name: &str) -> Option<Self> {
        let unit = match name.trim().to_lowercase().trim_start_matches('°') {
            "c" | "celsius" | "centigrade" => Unit::Celsius,
            "f" | "fahrenheit" => Unit::Fahrenheit,
            "k" | "kelvin" => Unit::Kelvin,
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Unit::Kilometer,
            "mi" | "mile" | "miles" => Unit::Mile,
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::Meter,
            "ft" | "foot" | "feet" => Unit::Foot,
            "kg" | "kilogram" | "kilograms" => Unit::Kilogram,
            "lb" | "lbs" | "pound" | "pounds" => Unit::Pound,
            _ => return None,
        };
        Some(unit)
    }

    fn dimension(self) -> Dimension {
        match self {
            Unit::Celsius | Unit::Fahrenheit | Unit::Kelvin => Dimension::Temperature,
            Unit::Kilometer | Unit::Mile | Unit::Meter | Unit::Foot => Dimension::Length,
            Unit::Kilogram | Unit::Pound => Dimension::Mass,
        }
    }

    /// To the dimension's base unit (°C, m, kg).
    fn to_base(self, v: f64) -> f64 {
        match self {
            Unit::Celsius | Unit::Meter | Unit::Kilogram => v,
            Unit::Fahrenheit => (v - 32.0) * 5.0 / 9.0,
            Unit::Kelvin => v - 273.15,
            Unit::Kilometer => v * 1000.0,
            Unit::Mile => v * 1609.344,
            Unit::Foot => v * 0.3048,
            Unit::Pound => v * 0.453_592_37,
        }
    }

    fn from_base(self, v: f64) -> f64 {
        match self {
            Unit::Celsius | Unit::Meter | Unit::Kilogram => v,
            Unit::Fahrenheit => v * 9.0 / 5.0 + 32.0,
            Unit::Kelvin => v + 273.15,
            Unit::Kilometer => v / 1000.0,
            Unit::Mile => v / 1609.344,
            Unit::Foot => v / 0.3048,
            Unit::Pound => v / 0.453_592_37,
        }
    }
}

/// Convert `value` between two units of the same dimension.
pub fn convert(value: f64, from_unit: &str, to_unit: &str) -> Result<f64, ToolError> {
    let unsupported = || ToolError::unsupported(format!("Conversion from {from_unit} to {to_unit} not supported"));
    let from = Unit::parse(from_unit).ok_or_else(unsupported)?;
    let to = Unit::parse(to_unit).ok_or_else(unsupported)?;
    if from.dimension() != to.dimension() {
        return Err(unsupported());
    }
    Ok(to.from_base(from.to_base(value)))
}

/// Temperature, length, and mass conversion.
#[derive(Debug)]
pub struct UnitConverter {
    spec: ToolSpec,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitConverter {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::builder(
                "unit_converter",
                "Convert a value between units: celsius/fahrenheit/kelvin, km/mi/m/ft, kg/lb",
            )
            .parameters_for::<ConvertArgs>()
            .returns(ParamType::Number)
            .example(
                r#"{"value": 100, "from_unit": "celsius", "to_unit": "fahrenheit"}"#,
                "212",
            )
            .build(),
        }
    }
}

impl Tool for UnitConverter {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let result = parse_args::<ConvertArgs>(arguments)
            .and_then(|a| convert(a.value, &a.from_unit, &a.to_unit))
            .map(number_value);
        Box::pin(async move { result })
    }
}

// ── Translator ─────────────────────────────────────────────────────

/// (phrase, language, english)
const PHRASES: &[(&str, &str, &str)] = &[
    ("hola", "spanish", "hello"),
    ("gracias", "spanish", "thank you"),
    ("adiós", "spanish", "goodbye"),
    ("mundo", "spanish", "world"),
    ("buenos días", "spanish", "good morning"),
    ("buenas noches", "spanish", "good night"),
    ("por favor", "spanish", "please"),
    ("disculpe", "spanish", "excuse me"),
    ("sí", "spanish", "yes"),
    ("no", "spanish", "no"),
    ("bonjour", "french", "hello"),
    ("merci", "french", "thank you"),
    ("au revoir", "french", "goodbye"),
    ("monde", "french", "world"),
    ("s'il vous plaît", "french", "please"),
    ("excusez-moi", "french", "excuse me"),
    ("oui", "french", "yes"),
    ("non", "french", "no"),
    ("hallo", "german", "hello"),
    ("danke", "german", "thank you"),
    ("auf wiedersehen", "german", "goodbye"),
    ("welt", "german", "world"),
    ("bitte", "german", "please"),
    ("entschuldigung", "german", "excuse me"),
    ("ja", "german", "yes"),
    ("nein", "german", "no"),
];

fn language_name(lang: &str) -> String {
    let lang = lang.trim().to_lowercase();
    match lang.as_str() {
        "en" | "eng" => "english".into(),
        "es" | "spa" => "spanish".into(),
        "fr" | "fra" => "french".into(),
        "de" | "deu" | "ger" => "german".into(),
        _ => lang,
    }
}

/// Translate `text` using the phrase table.
pub fn translate(text: &str, from_lang: &str, to_lang: &str) -> String {
    let from = language_name(from_lang);
    let to = language_name(to_lang);
    let text = text.trim();
    if from == to {
        return text.to_string();
    }
    let phrase = text.to_lowercase();

    if from == "english" {
        if let Some((foreign, _, _)) = PHRASES.iter().find(|(_, l, en)| *l == to && *en == phrase) {
            return foreign.to_string();
        }
    } else if to == "english"
        && let Some((_, _, en)) = PHRASES
            .iter()
            .find(|(p, l, _)| *p == phrase && (from == "auto" || *l == from))
    {
        return en.to_string();
    }

    format!("Translated from {from} to {to}: {text}")
}

/// Phrase-table translator between English, Spanish, French, and German.
#[derive(Debug)]
pub struct Translator {
    spec: ToolSpec,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::builder("translator", "Translate short phrases between languages")
                .parameters_for::<TranslateArgs>()
                .returns(ParamType::String)
                .example(r#"{"text": "hola", "to_lang": "english"}"#, "hello")
                .build(),
        }
    }
}

impl Tool for Translator {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let result = parse_args::<TranslateArgs>(arguments)
            .map(|a| Value::String(translate(&a.text, &a.from_lang, &a.to_lang)));
        Box::pin(async move { result })
    }
}

// ── Random quote ───────────────────────────────────────────────────

const QUOTES: &[(&str, &[&str])] = &[
    (
        "general",
        &[
            "The only way to do great work is to love what you do. - Steve Jobs",
            "Life is what happens to you while you're busy making other plans. - John Lennon",
        ],
    ),
    (
        "tech",
        &[
            "Any sufficiently advanced technology is indistinguishable from magic. - Arthur C. Clarke",
            "The computer was born to solve problems that did not exist before. - Bill Gates",
        ],
    ),
    (
        "motivation",
        &[
            "The only impossible journey is the one you never begin. - Tony Robbins",
            "Success is not final, failure is not fatal: it is the courage to continue that counts. - Winston Churchill",
        ],
    ),
];

/// Quotes by category, rotating on each call.
#[derive(Debug)]
pub struct RandomQuote {
    spec: ToolSpec,
    next: AtomicUsize,
}

impl Default for RandomQuote {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomQuote {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::builder("random_quote", "Get an inspirational quote")
                .parameters_for::<QuoteArgs>()
                .returns(ParamType::String)
                .build(),
            next: AtomicUsize::new(0),
        }
    }

    /// The next quote in `category`. Unknown categories use `general`.
    pub fn quote(&self, category: &str) -> &'static str {
        let category = category.trim().to_lowercase();
        let quotes = QUOTES
            .iter()
            .find(|(c, _)| *c == category)
            .or_else(|| QUOTES.first())
            .map_or(&[][..], |(_, q)| *q);
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        quotes.get(i % quotes.len().max(1)).copied().unwrap_or_default()
    }
}

impl Tool for RandomQuote {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn invoke(&self, arguments: &Arguments) -> ToolFuture<'_> {
        let result = parse_args::<QuoteArgs>(arguments).map(|a| Value::String(self.quote(&a.category).into()));
        Box::pin(async move { result })
    }
}

// ── Registry helpers ───────────────────────────────────────────────

impl ToolRegistry {
    /// Register every built-in tool with the bundled knowledge base.
    pub fn with_builtin_tools(self) -> Result<Self, AgentError> {
        self.with_builtin_tools_using(KnowledgeBase::default())
    }

    /// Register every built-in tool, with `kb` behind the `kb` tool.
    pub fn with_builtin_tools_using(self, kb: KnowledgeBase) -> Result<Self, AgentError> {
        self.with(Calculator::new())?
            .with(Weather::new())?
            .with(KnowledgeBaseTool::new(kb))?
            .with(UnitConverter::new())?
            .with(Translator::new())?
            .with(RandomQuote::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn args(v: Value) -> Arguments {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn expressions_are_normalized() {
        assert_eq!(normalize_expression("What is 12.5% of 243?"), "12.5/100*243");
        assert_eq!(normalize_expression("add 10 to 5"), "(5) + (10)");
        assert_eq!(normalize_expression("6 times 7"), "6 * 7");
        assert_eq!(normalize_expression("50% + 1"), "(50/100) + 1");
    }

    #[test]
    fn evaluate_arithmetic() {
        assert_eq!(evaluate("What is 12.5% of 243?").unwrap(), 30.375);
        assert_eq!(evaluate("(18+17)/2+10").unwrap(), 27.5);
        assert_eq!(evaluate("calculate 2 ^ 10").unwrap(), 1024.0);
        assert_eq!(evaluate("9 divided by 4").unwrap(), 2.25);
    }

    #[test]
    fn bad_expressions_are_invalid_input() {
        for bad in ["2 +", "rm -rf /", "1/0", ""] {
            let err = evaluate(bad).unwrap_err();
            assert_eq!(err.kind, crate::tools::core::ToolErrorKind::InvalidInput, "{bad}");
        }
    }

    #[tokio::test]
    async fn calc_tool_returns_integers_when_integral() {
        let calc = Calculator::new();
        assert_eq!(calc.invoke(&args(json!({"expr": "2+2"}))).await, Ok(json!(4)));
        assert_eq!(calc.invoke(&args(json!({"expr": "7/2"}))).await, Ok(json!(3.5)));
    }

    #[tokio::test]
    async fn weather_table_with_default() {
        let weather = Weather::new();
        assert_eq!(weather.invoke(&args(json!({"city": " PARIS "}))).await, Ok(json!(18)));
        assert_eq!(weather.invoke(&args(json!({"city": "Amsterdam"}))).await, Ok(json!(19.5)));
        assert_eq!(weather.invoke(&args(json!({"city": "Reykjavik"}))).await, Ok(json!(20)));
    }

    #[test]
    fn kb_lookup_is_case_insensitive_both_ways() {
        let kb = KnowledgeBase::default();
        assert!(kb.lookup("ada lovelace").unwrap().starts_with("Ada Lovelace"));
        assert!(kb.lookup("Tell me about Alan Turing please").is_some());
        assert_eq!(kb.lookup("Linus"), None);
        assert_eq!(kb.lookup("  "), None);
    }

    #[test]
    fn kb_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"entries": [{{"name": "Rust", "summary": "A systems language."}}]}}"#).unwrap();
        let kb = KnowledgeBase::from_path(file.path()).unwrap();
        assert_eq!(kb.lookup("rust"), Some("A systems language."));

        let missing = KnowledgeBase::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(missing, KnowledgeBaseError::Io { .. }));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            KnowledgeBase::from_path(bad.path()),
            Err(KnowledgeBaseError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn kb_tool_reports_misses() {
        let tool = KnowledgeBaseTool::new(KnowledgeBase::default());
        assert_eq!(tool.invoke(&args(json!({"q": "nobody"}))).await, Ok(json!(NO_ENTRY)));
    }

    #[test]
    fn conversions() {
        assert_eq!(convert(100.0, "celsius", "fahrenheit").unwrap(), 212.0);
        assert!((convert(212.0, "F", "c").unwrap() - 100.0).abs() < 1e-9);
        assert!((convert(0.0, "°C", "kelvin").unwrap() - 273.15).abs() < 1e-9);
        assert!((convert(1.0, "mi", "km").unwrap() - 1.609344).abs() < 1e-9);
        assert!((convert(1.0, "kg", "lb").unwrap() - 2.204_622_621_8).abs() < 1e-6);

        let err = convert(1.0, "kg", "km").unwrap_err();
        assert_eq!(err.kind, crate::tools::core::ToolErrorKind::Unsupported);
        assert_eq!(err.message, "Conversion from kg to km not supported");
        assert!(convert(1.0, "parsecs", "km").is_err());
    }

    #[test]
    fn translations() {
        assert_eq!(translate("Hola", "auto", "english"), "hello");
        assert_eq!(translate("merci", "fr", "en"), "thank you");
        assert_eq!(translate("hello", "english", "german"), "hallo");
        assert_eq!(translate(" Same ", "french", "french"), "Same");
        assert_eq!(
            translate("ciao", "italian", "english"),
            "Translated from italian to english: ciao"
        );
    }

    #[test]
    fn quotes_rotate_within_category() {
        let tool = RandomQuote::new();
        let first = tool.quote("tech");
        let second = tool.quote("tech");
        assert_ne!(first, second);
        assert!(first.contains("Clarke") || first.contains("Gates"));
        assert!(tool.quote("unknown").contains(" - "));
    }

    #[test]
    fn builtin_registry_order_and_schemas() {
        let registry = ToolRegistry::new().with_builtin_tools().unwrap();
        assert_eq!(
            registry.names(),
            vec!["calc", "weather", "kb", "unit_converter", "translator", "random_quote"]
        );
        let translator = registry.get("translator").unwrap().spec();
        assert!(translator.param("text").unwrap().required);
        assert_eq!(translator.param("to_lang").unwrap().default, Some(json!("english")));
        let schemas = registry.json_schemas();
        assert_eq!(schemas[0]["name"], "calc");
        assert_eq!(schemas[0]["returns"], "number");
        assert_eq!(schemas[0]["parameters"]["required"], json!(["expr"]));
    }
}
