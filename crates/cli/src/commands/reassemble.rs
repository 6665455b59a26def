//! `chatloom reassemble`: Fold JSON-lines stream chunks into one message.

use chatloom_core::{MessageChunk, concat_chunks};

use super::{CmdResult, InputArgs, read_input};

/// Parse one chunk per non-blank line.
pub fn parse_chunks(text: &str) -> Result<Vec<MessageChunk>, Box<dyn std::error::Error>> {
    let mut chunks = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| format!("Line {}: invalid JSON: {e}", line_no + 1))?;
        let chunk = MessageChunk::from_value(value)
            .map_err(|e| format!("Line {}: {e}", line_no + 1))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

pub fn run(args: InputArgs) -> CmdResult {
    let chunks = parse_chunks(&read_input(args.input.as_deref())?)?;
    tracing::debug!(chunks = chunks.len(), "Parsed stream chunks");

    let merged = concat_chunks(chunks)?.ok_or("No chunks in input")?;
    let message = merged.into_message()?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
