//! Chatloom CLI: the main entry point.
//!
//! Commands:
//! - `filter`    : Keep or drop messages by name, type or id
//! - `merge`     : Merge runs of same-type messages
//! - `trim`      : Trim a history to a token budget
//! - `run`       : Run the pipeline from `chatloom.toml`
//! - `reassemble`: Fold JSON-lines stream chunks into one message
//! - `render`    : Print a history as plain text
//!
//! Histories are read as a JSON array from a file or stdin and written as
//! JSON to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::{FilterArgs, InputArgs, RenderArgs, TrimArgs};

#[derive(Parser)]
#[command(
    name = "chatloom",
    about = "Chatloom: chat history filtering, merging and trimming",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./chatloom.toml)
    #[arg(short, long, global = true, env = "CHATLOOM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep or drop messages by name, type or id
    Filter(FilterArgs),

    /// Merge consecutive messages of the same type
    Merge(InputArgs),

    /// Trim a history to a token budget
    Trim(TrimArgs),

    /// Run the configured filter / merge / trim pipeline
    Run(InputArgs),

    /// Reassemble JSON-lines stream chunks into one message
    Reassemble(InputArgs),

    /// Render a history as `Role: content` lines
    Render(RenderArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Filter(args) => commands::filter::run(args)?,
        Commands::Merge(args) => commands::merge::run(args)?,
        Commands::Trim(args) => commands::trim::run(args).await?,
        Commands::Run(args) => commands::pipeline::run(args, cli.config).await?,
        Commands::Reassemble(args) => commands::reassemble::run(args)?,
        Commands::Render(args) => commands::render::run(args)?,
    }

    Ok(())
}
