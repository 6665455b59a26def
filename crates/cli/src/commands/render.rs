//! `chatloom render`: Print a history as plain text.

use chatloom_core::get_buffer_string;

use super::{CmdResult, RenderArgs, read_messages};

pub fn run(args: RenderArgs) -> CmdResult {
    let messages = read_messages(&args.input)?;
    println!("{}", get_buffer_string(&messages, &args.human_prefix, &args.ai_prefix)?);
    Ok(())
}
