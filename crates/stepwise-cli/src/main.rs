//! Answer questions with the stepwise tool agent.
//!
//! Plans come from the deterministic rule planner and run against the
//! built-in tools. Settings are read from `STEPWISE_*` environment
//! variables and may be overridden by flags.
//!
//! # Examples
//!
//! ```sh
//! stepwise What is 12.5% of 243?
//! stepwise --each "Who is Alan Turing?" "Weather in Dhaka"
//! stepwise --list-tools
//! STEPWISE_LOG=stepwise=debug stepwise --kb-path kb.json Who is Ada Lovelace
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use stepwise::prelude::*;
use stepwise_cli::{Settings, init_logging};
use tracing::debug;

/// Answer questions by planning and running tool calls.
#[derive(Parser)]
#[command(name = "stepwise", version)]
struct Cli {
    /// The query. Words are joined with spaces unless `--each` is given.
    #[arg(required_unless_present = "list_tools")]
    query: Vec<String>,

    /// Treat every argument as a separate query.
    #[arg(long)]
    each: bool,

    /// Enable debug logging on stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Print the tool schemas as JSON and exit.
    #[arg(long)]
    list_tools: bool,

    /// Tool attempt budget, including the first attempt.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Longest accepted query, in characters.
    #[arg(long)]
    max_query_chars: Option<usize>,

    /// Decimal places for numeric answers.
    #[arg(long)]
    precision: Option<u32>,

    /// JSON knowledge base (`{"entries": [{"name", "summary"}]}`).
    #[arg(long)]
    kb_path: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.max_attempts {
            settings.max_attempts = n;
        }
        if let Some(n) = self.max_query_chars {
            settings.max_query_chars = n;
        }
        if let Some(n) = self.precision {
            settings.precision = n;
        }
        if let Some(path) = &self.kb_path {
            settings.kb_path = Some(path.clone());
        }
        settings
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match Settings::from_env() {
        Ok(s) => cli.apply(s),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    debug!(?settings, "resolved settings");

    let registry = match settings.build_registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if cli.list_tools {
        match serde_json::to_string_pretty(&registry.json_schemas()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let agent = Orchestrator::new(Arc::new(RulePlanner::new()), Arc::new(registry))
        .with_config(settings.build_config())
        .with_event_handler(Arc::new(LoggingHandler));

    let queries = if cli.each {
        cli.query.clone()
    } else {
        vec![cli.query.join(" ")]
    };

    let mut failed = false;
    for result in agent.answer_many(&queries).await {
        match result {
            Ok(answer) => println!("{}", answer.text),
            Err(failure) => {
                eprintln!("Error: {failure}");
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}
