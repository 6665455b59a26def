//! `chatloom trim`: Trim a history to a token budget.

use std::sync::Arc;

use chatloom_config::{EstimatorConfig, TrimConfig};
use chatloom_transform::trim_messages;

use super::{CmdResult, TrimArgs, read_messages, write_messages};

pub async fn run(args: TrimArgs) -> CmdResult {
    let estimator = EstimatorConfig {
        chars_per_token: args.chars_per_token,
        message_overhead: args.message_overhead,
    };
    let options = TrimConfig {
        max_tokens: args.max_tokens,
        strategy: args.strategy,
        allow_partial: args.allow_partial,
        end_on: args.end_on,
        start_on: args.start_on,
        include_system: args.include_system,
    }
    .to_options(Arc::new(estimator.counter()))?;

    let messages = read_messages(&args.input)?;
    let trimmed = trim_messages(&messages, &options).await?;
    write_messages(&trimmed)
}
