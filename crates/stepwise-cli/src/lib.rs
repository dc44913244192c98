//! Settings and wiring for the `stepwise` command-line front end.
//!
//! [`Settings`] layers configuration the way the binary applies it:
//! built-in defaults, then `STEPWISE_*` environment variables, then
//! command-line flags. [`Settings::build_registry`] and
//! [`Settings::build_config`] turn the result into library types.

use std::path::PathBuf;

use stepwise::agent::AgentConfig;
use stepwise::api::retry::RetryConfig;
use stepwise::error::AgentError;
use stepwise::tools::{KnowledgeBase, KnowledgeBaseError, ToolRegistry};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a log filter (falls back to `RUST_LOG`).
pub const LOG_ENV: &str = "STEPWISE_LOG";

const ENV_PREFIX: &str = "STEPWISE_";

/// Errors raised while assembling the agent from settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("failed to load knowledge base: {0}")]
    KnowledgeBase(#[from] KnowledgeBaseError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Effective CLI settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Tool attempt budget, including the first attempt. Default: `3`.
    pub max_attempts: u32,
    /// Longest accepted query in characters. Default: `10_000`.
    pub max_query_chars: usize,
    /// Decimal places for numeric answers. Default: `2`.
    pub precision: u32,
    /// JSON knowledge base replacing the built-in entries.
    pub kb_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_query_chars: stepwise::agent::guardrails::DEFAULT_MAX_QUERY_CHARS,
            precision: stepwise::agent::guardrails::DEFAULT_PRECISION,
            kb_path: None,
        }
    }
}

impl Settings {
    /// Defaults overridden by `STEPWISE_*` variables from the process
    /// environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_pairs(std::env::vars())
    }

    /// Defaults overridden by `STEPWISE_*` key/value pairs.
    ///
    /// Unknown keys and keys without the prefix are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "MAX_ATTEMPTS" => settings.max_attempts = parse_setting(key, value)?,
                "MAX_QUERY_CHARS" => settings.max_query_chars = parse_setting(key, value)?,
                "PRECISION" => settings.precision = parse_setting(key, value)?,
                "KB_PATH" if !value.is_empty() => settings.kb_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(settings)
    }

    /// Registry of built-in tools, with the knowledge base loaded from
    /// [`kb_path`](Self::kb_path) when one is set.
    pub fn build_registry(&self) -> Result<ToolRegistry, SettingsError> {
        let registry = match &self.kb_path {
            Some(path) => ToolRegistry::new().with_builtin_tools_using(KnowledgeBase::from_path(path)?)?,
            None => ToolRegistry::new().with_builtin_tools()?,
        };
        Ok(registry)
    }

    pub fn build_config(&self) -> AgentConfig {
        AgentConfig::default()
            .with_max_query_chars(self.max_query_chars)
            .with_precision(self.precision)
            .with_tool_retry(RetryConfig::with_attempts(self.max_attempts))
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Log filter directive: `debug` when verbose, otherwise `STEPWISE_LOG`,
/// then `RUST_LOG`, then `warn`.
pub fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a `fmt` subscriber writing to stderr. Stdout carries answers only.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_library() {
        let settings = Settings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.max_query_chars, 10_000);
        assert_eq!(settings.precision, 2);
        assert!(settings.kb_path.is_none());
    }

    #[test]
    fn environment_pairs_override_defaults() {
        let settings = Settings::from_pairs([
            ("STEPWISE_MAX_ATTEMPTS", "5"),
            ("STEPWISE_PRECISION", " 4 "),
            ("STEPWISE_KB_PATH", "/tmp/kb.json"),
            ("HOME", "/root"),
            ("STEPWISE_UNKNOWN", "x"),
        ])
        .unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.precision, 4);
        assert_eq!(settings.max_query_chars, 10_000);
        assert_eq!(settings.kb_path, Some(PathBuf::from("/tmp/kb.json")));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = Settings::from_pairs([("STEPWISE_MAX_QUERY_CHARS", "lots")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for STEPWISE_MAX_QUERY_CHARS: 'lots'");
    }

    #[test]
    fn config_carries_settings() {
        let settings = Settings {
            max_attempts: 4,
            max_query_chars: 64,
            precision: 1,
            kb_path: None,
        };
        let config = settings.build_config();
        assert_eq!(config.executor.retry.max_attempts, 4);
        assert_eq!(config.input.max_chars, 64);
        assert_eq!(config.output.precision, 1);
    }

    #[test]
    fn registry_uses_the_configured_knowledge_base() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"entries": [{{"name": "Rust", "summary": "A language."}}]}}"#).unwrap();
        let settings = Settings {
            kb_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let registry = settings.build_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec!["calc", "weather", "kb", "unit_converter", "translator", "random_quote"]
        );

        let missing = Settings {
            kb_path: Some(PathBuf::from("/nonexistent/kb.json")),
            ..Default::default()
        };
        assert!(matches!(
            missing.build_registry(),
            Err(SettingsError::KnowledgeBase(_))
        ));
    }
}
