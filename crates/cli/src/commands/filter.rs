//! `chatloom filter`: Keep or drop messages by name, type or id.

use chatloom_config::FilterConfig;
use chatloom_transform::filter_messages;

use super::{CmdResult, FilterArgs, read_messages, write_messages};

pub fn run(args: FilterArgs) -> CmdResult {
    let options = FilterConfig {
        include_names: args.include_names,
        exclude_names: args.exclude_names,
        include_types: args.include_types,
        exclude_types: args.exclude_types,
        include_ids: args.include_ids,
        exclude_ids: args.exclude_ids,
    }
    .to_options()?;

    let messages = read_messages(&args.input)?;
    write_messages(&filter_messages(&messages, &options))
}
