//! Declared tool metadata: name, description, typed parameters.
//!
//! A [`ToolSpec`] is built once at registration time and never changes. It is
//! the single source for three things: the tool listing rendered into the
//! planning prompt, the JSON Schema export, and argument coercion before a
//! tool is invoked.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ── ParamType ──────────────────────────────────────────────────────

/// JSON type of a tool parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }

    /// Read the type from a JSON Schema property.
    ///
    /// Handles both `"type": "string"` and schemars' nullable form
    /// `"type": ["string", "null"]`. Anything unrecognised maps to `Any`.
    pub fn from_schema(property: &Value) -> Self {
        let name = match property.get("type") {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };
        match name {
            Some("string") => ParamType::String,
            Some("number") => ParamType::Number,
            Some("integer") => ParamType::Integer,
            Some("boolean") => ParamType::Boolean,
            Some("array") => ParamType::Array,
            Some("object") => ParamType::Object,
            _ => ParamType::Any,
        }
    }

    /// Coerce `value` to this type, or describe why it can't be.
    ///
    /// Accepted coercions: numeric strings to number/integer, integral floats
    /// to integer, `"true"`/`"false"` to boolean, numbers and booleans to
    /// string.
    pub fn coerce(self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (ParamType::Any, v) => Ok(v),
            (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
            (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (ParamType::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (ParamType::Number, Value::String(s)) => {
                parse_number(&s).ok_or_else(|| format!("expected number, got \"{s}\""))
            }
            (ParamType::Integer, Value::Number(n)) => integral(&n)
                .map(Value::from)
                .ok_or_else(|| format!("expected integer, got {n}")),
            (ParamType::Integer, Value::String(s)) => parse_number(&s)
                .and_then(|v| match v {
                    Value::Number(n) => integral(&n),
                    _ => None,
                })
                .map(Value::from)
                .ok_or_else(|| format!("expected integer, got \"{s}\"")),
            (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str()
            {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("expected boolean, got \"{s}\"")),
            },
            (ParamType::Array, v @ Value::Array(_)) => Ok(v),
            (ParamType::Object, v @ Value::Object(_)) => Ok(v),
            (ty, other) => Err(format!(
                "expected {}, got {}",
                ty.as_str(),
                json_type_name(&other)
            )),
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = s.parse::<f64>().ok()?;
    serde_json::Number::from_f64(f).map(Value::Number)
}

fn integral(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// JSON type name of a value, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── ToolSpec ───────────────────────────────────────────────────────

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    /// Filled in when the argument is absent.
    pub default: Option<Value>,
    pub description: String,
}

/// An input/output pair shown to the model in the tool listing.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageExample {
    pub input: String,
    pub output: String,
}

/// Immutable description of a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    /// Unique within a registry.
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    pub params: Vec<ParamSpec>,
    /// Declared result type, enforced by the output guardrail.
    pub output_type: Option<ParamType>,
    pub examples: Vec<UsageExample>,
}

impl ToolSpec {
    /// Start building a spec.
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            spec: ToolSpec {
                name: name.into(),
                description: description.into(),
                params: Vec::new(),
                output_type: None,
                examples: Vec::new(),
            },
        }
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema object for the parameters.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            let mut prop = Map::new();
            if p.param_type != ParamType::Any {
                prop.insert("type".into(), json!(p.param_type.as_str()));
            }
            if !p.description.is_empty() {
                prop.insert("description".into(), json!(p.description));
            }
            if let Some(default) = &p.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(p.name.clone(), Value::Object(prop));
            if p.required {
                required.push(json!(p.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// `{name, description, parameters}` export entry.
    pub fn to_export(&self) -> Value {
        let mut entry = json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.to_json_schema(),
        });
        if let Some(ty) = self.output_type {
            entry["returns"] = json!(ty.as_str());
        }
        entry
    }

    /// One-block description for the planning prompt.
    ///
    /// ```text
    /// calc(expr: string) -> number
    ///   Evaluate an arithmetic expression.
    ///   e.g. {"expr": "12.5% of 243"} -> 30.375
    /// ```
    pub fn to_description(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = format!("{}: {}", p.name, p.param_type.as_str());
                if let Some(default) = &p.default {
                    s.push_str(&format!(" = {default}"));
                } else if !p.required {
                    s.push('?');
                }
                s
            })
            .collect();
        let mut desc = format!("{}({})", self.name, params.join(", "));
        if let Some(ty) = self.output_type {
            desc.push_str(&format!(" -> {}", ty.as_str()));
        }
        desc.push_str(&format!("\n  {}", self.description));
        for ex in &self.examples {
            desc.push_str(&format!("\n  e.g. {} -> {}", ex.input, ex.output));
        }
        desc
    }
}

/// Builder for [`ToolSpec`].
#[derive(Debug, Clone)]
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    /// Add a required parameter.
    pub fn param(self, name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        self.push(ParamSpec {
            name: name.into(),
            param_type: ty,
            required: true,
            default: None,
            description: description.into(),
        })
    }

    /// Add an optional parameter with no default.
    pub fn optional(
        self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.push(ParamSpec {
            name: name.into(),
            param_type: ty,
            required: false,
            default: None,
            description: description.into(),
        })
    }

    /// Add an optional parameter that defaults to `default` when absent.
    pub fn with_default(
        self,
        name: impl Into<String>,
        ty: ParamType,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        self.push(ParamSpec {
            name: name.into(),
            param_type: ty,
            required: false,
            default: Some(default.into()),
            description: description.into(),
        })
    }

    /// Derive the parameter list from a `JsonSchema` type.
    ///
    /// Field doc comments become descriptions, `#[serde(default = ...)]`
    /// values become defaults, and `Option<T>` fields become optional.
    pub fn parameters_for<T: JsonSchema>(mut self) -> Self {
        let schema = crate::json_schema_for::<T>();
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                self = self.push(ParamSpec {
                    name: name.clone(),
                    param_type: ParamType::from_schema(prop),
                    required: required.contains(&name.as_str()),
                    default: prop.get("default").cloned(),
                    description: prop
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
        self
    }

    /// Declare the result type.
    pub fn returns(mut self, ty: ParamType) -> Self {
        self.spec.output_type = Some(ty);
        self
    }

    /// Add a usage example.
    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.spec.examples.push(UsageExample {
            input: input.into(),
            output: output.into(),
        });
        self
    }

    /// Finish the spec.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or a parameter is declared twice. Both
    /// are programming errors in tool registration code.
    pub fn build(self) -> ToolSpec {
        assert!(!self.spec.name.trim().is_empty(), "tool name must not be empty");
        for (i, p) in self.spec.params.iter().enumerate() {
            assert!(
                !self.spec.params[..i].iter().any(|q| q.name == p.name),
                "parameter '{}' declared twice on tool '{}'",
                p.name,
                self.spec.name
            );
        }
        self.spec
    }

    fn push(mut self, param: ParamSpec) -> Self {
        self.spec.params.push(param);
        self
    }
}
