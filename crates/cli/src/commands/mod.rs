//! Subcommand implementations and the argument/IO plumbing they share.

pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod reassemble;
pub mod render;
pub mod trim;

use std::io::Read;
use std::path::{Path, PathBuf};

use chatloom_core::Message;
use clap::Args;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Where to read input from.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Input file; reads stdin when omitted or `-`
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Keep messages with these names
    #[arg(long, value_delimiter = ',')]
    pub include_names: Option<Vec<String>>,

    /// Drop messages with these names
    #[arg(long, value_delimiter = ',')]
    pub exclude_names: Option<Vec<String>>,

    /// Keep messages of these types (e.g. human,ai)
    #[arg(long, value_delimiter = ',')]
    pub include_types: Option<Vec<String>>,

    /// Drop messages of these types
    #[arg(long, value_delimiter = ',')]
    pub exclude_types: Option<Vec<String>>,

    /// Keep messages with these ids
    #[arg(long, value_delimiter = ',')]
    pub include_ids: Option<Vec<String>>,

    /// Drop messages with these ids
    #[arg(long, value_delimiter = ',')]
    pub exclude_ids: Option<Vec<String>>,
}

#[derive(Args, Debug, Clone)]
pub struct TrimArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Token budget
    #[arg(long, env = "CHATLOOM_MAX_TOKENS")]
    pub max_tokens: usize,

    /// Which end to keep: first or last
    #[arg(long, default_value = "last", env = "CHATLOOM_STRATEGY")]
    pub strategy: String,

    /// Allow cutting down the first message that does not fit
    #[arg(long)]
    pub allow_partial: bool,

    /// Drop trailing messages until one of these types
    #[arg(long, value_delimiter = ',')]
    pub end_on: Option<Vec<String>>,

    /// Drop leading messages until one of these types (last only)
    #[arg(long, value_delimiter = ',')]
    pub start_on: Option<Vec<String>>,

    /// Always keep a leading system message (last only)
    #[arg(long)]
    pub include_system: bool,

    /// Characters per token for the estimator
    #[arg(long, default_value_t = 4)]
    pub chars_per_token: usize,

    /// Fixed tokens charged per message
    #[arg(long, default_value_t = 4)]
    pub message_overhead: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Prefix for human messages
    #[arg(long, default_value = "Human")]
    pub human_prefix: String,

    /// Prefix for AI messages
    #[arg(long, default_value = "AI")]
    pub ai_prefix: String,
}

/// Read the whole input, from a file or stdin.
pub fn read_input(path: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()).into()),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Parse a JSON array of messages.
pub fn parse_messages(text: &str) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let messages: Vec<Message> =
        serde_json::from_str(text).map_err(|e| format!("Invalid message list: {e}"))?;
    tracing::debug!(count = messages.len(), "Loaded messages");
    Ok(messages)
}

pub fn read_messages(args: &InputArgs) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    parse_messages(&read_input(args.input.as_deref())?)
}

pub fn write_messages(messages: &[Message]) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(messages)?);
    Ok(())
}
