//! Plain-text rendering of a conversation.

use crate::error::{Error, Result};
use crate::message::{Message, MessageKind};

/// Render messages as `Role: content` lines, one per message.
///
/// Function and tool messages carry their `name` as `Role: name, content`.
/// Generic messages use their own role. Remove markers have nothing to render
/// and are rejected.
pub fn get_buffer_string(messages: &[Message], human_prefix: &str, ai_prefix: &str) -> Result<String> {
    let mut lines = Vec::with_capacity(messages.len());
    for message in messages {
        let role = match message.kind {
            MessageKind::Human => human_prefix.to_string(),
            MessageKind::Ai => ai_prefix.to_string(),
            MessageKind::System | MessageKind::Developer => "System".to_string(),
            MessageKind::Tool => "Tool".to_string(),
            MessageKind::Function => "Function".to_string(),
            MessageKind::Generic => message.fields.role.clone().unwrap_or_default(),
            MessageKind::Remove => {
                return Err(Error::UnsupportedConversion(
                    "remove messages can not be rendered".into(),
                ));
            }
        };
        let text = message.content().to_text();
        let line = match (message.kind, message.name()) {
            (MessageKind::Function | MessageKind::Tool, Some(name)) => {
                format!("{role}: {name}, {text}")
            }
            _ => format!("{role}: {text}"),
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
