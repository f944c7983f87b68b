//! sqlclaw CLI: the main entry point.
//!
//! Commands:
//! - `ask`: Answer a question with SQL (interactive without a question)
//! - `eval`: Grade the agent against a file of gold queries
//! - `guides`: Show the business rules retrieved for a search term

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlclaw_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "sqlclaw",
    about = "sqlclaw — a self-verifying natural-language to SQL agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.sqlclaw/config.toml)
    #[arg(short, long, global = true, env = "SQLCLAW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question with SQL
    Ask {
        /// The question; omit for interactive mode
        question: Option<String>,
    },

    /// Evaluate the agent against a JSON file of {prompt, query} cases
    Eval {
        /// Path to the cases file
        cases: PathBuf,

        /// Cases evaluated in parallel (default from config)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Only run the first N cases
        #[arg(long)]
        max_cases: Option<usize>,
    },

    /// Show the business rules retrieved for a search term
    Guides {
        /// Schema name, domain keyword, or topic
        term: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_env(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Commands::Ask { question } => commands::ask::run(config, question).await?,
        Commands::Eval {
            cases,
            concurrency,
            max_cases,
        } => commands::eval::run(config, &cases, concurrency, max_cases).await?,
        Commands::Guides { term } => commands::guides::run(config, &term).await?,
    }

    Ok(())
}
