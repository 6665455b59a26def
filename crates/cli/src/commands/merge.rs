//! `chatloom merge`: Merge runs of same-type messages.

use chatloom_transform::merge_message_runs;

use super::{CmdResult, InputArgs, read_messages, write_messages};

pub fn run(args: InputArgs) -> CmdResult {
    let messages = read_messages(&args)?;
    write_messages(&merge_message_runs(&messages)?)
}
