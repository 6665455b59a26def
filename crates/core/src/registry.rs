//! Kind registry.
//!
//! One entry per [`MessageKind`], holding the constructors that turn a raw
//! [`MessageFields`] bag into a validated [`Message`] or [`MessageChunk`].
//! Every conversion in the crate (deserialization, chunk round-trips, partial
//! trimming) goes through here.

use crate::chunk::MessageChunk;
use crate::error::{Error, Result};
use crate::message::{Message, MessageFields, MessageKind, ToolCallChunk};

/// `additional_kwargs` key marking a system message as developer instructions.
pub const DEVELOPER_MARKER_KEY: &str = "role";
pub const DEVELOPER_MARKER_VALUE: &str = "developer";

/// Constructors for a single kind.
pub struct KindEntry {
    pub kind: MessageKind,
    pub to_message: fn(MessageFields) -> Result<Message>,
    pub to_chunk: fn(MessageFields) -> Result<MessageChunk>,
}

impl std::fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindEntry").field("kind", &self.kind).finish()
    }
}

// Indexed by `MessageKind::index()`.
static REGISTRY: [KindEntry; 8] = [
    KindEntry {
        kind: MessageKind::Human,
        to_message: human_message,
        to_chunk: human_chunk,
    },
    KindEntry {
        kind: MessageKind::Ai,
        to_message: ai_message,
        to_chunk: ai_chunk,
    },
    KindEntry {
        kind: MessageKind::System,
        to_message: system_message,
        to_chunk: system_chunk,
    },
    KindEntry {
        kind: MessageKind::Developer,
        to_message: developer_message,
        to_chunk: developer_chunk,
    },
    KindEntry {
        kind: MessageKind::Tool,
        to_message: tool_message,
        to_chunk: tool_chunk,
    },
    KindEntry {
        kind: MessageKind::Function,
        to_message: function_message,
        to_chunk: function_chunk,
    },
    KindEntry {
        kind: MessageKind::Generic,
        to_message: generic_message,
        to_chunk: generic_chunk,
    },
    KindEntry {
        kind: MessageKind::Remove,
        to_message: remove_message,
        to_chunk: remove_chunk,
    },
];

/// Look up the entry for a kind. Total over [`MessageKind`].
pub fn lookup(kind: MessageKind) -> &'static KindEntry {
    &REGISTRY[kind.index()]
}

/// Look up an entry by its canonical wire tag (`"human"`, `"ai"`, ...).
pub fn lookup_tag(tag: &str) -> Result<&'static KindEntry> {
    REGISTRY
        .iter()
        .find(|entry| entry.kind.as_str() == tag)
        .ok_or_else(|| Error::UnrecognizedChunkKind {
            kind: tag.to_string(),
            supported: supported_tags(),
        })
}

/// Build a validated message of `kind`.
pub fn to_message(kind: MessageKind, fields: MessageFields) -> Result<Message> {
    (lookup(kind).to_message)(fields)
}

/// Build a validated chunk of `kind`.
pub fn to_chunk(kind: MessageKind, fields: MessageFields) -> Result<MessageChunk> {
    (lookup(kind).to_chunk)(fields)
}

/// Output of [`convert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    Message(Message),
    Chunk(MessageChunk),
}

/// Build either form of `kind` from raw fields.
pub fn convert(kind: MessageKind, fields: MessageFields, return_chunk: bool) -> Result<Converted> {
    if return_chunk {
        to_chunk(kind, fields).map(Converted::Chunk)
    } else {
        to_message(kind, fields).map(Converted::Message)
    }
}

fn supported_tags() -> String {
    MessageKind::ALL
        .iter()
        .map(|kind| format!("'{kind}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tag a field bag as developer instructions.
pub fn mark_developer(mut fields: MessageFields) -> MessageFields {
    fields.additional_kwargs.insert(
        DEVELOPER_MARKER_KEY.to_string(),
        serde_json::Value::String(DEVELOPER_MARKER_VALUE.to_string()),
    );
    fields
}

pub fn is_developer(fields: &MessageFields) -> bool {
    fields
        .additional_kwargs
        .get(DEVELOPER_MARKER_KEY)
        .and_then(serde_json::Value::as_str)
        == Some(DEVELOPER_MARKER_VALUE)
}

fn require(
    kind: MessageKind,
    field: &'static str,
    value: &Option<String>,
) -> Result<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(Error::MissingDiscriminantField { kind, field }),
    }
}

fn message(kind: MessageKind, fields: MessageFields) -> Message {
    Message { kind, fields }
}

fn chunk(kind: MessageKind, fields: MessageFields) -> MessageChunk {
    MessageChunk {
        kind,
        fields,
        tool_call_chunks: Vec::new(),
    }
}

// --- Messages ---

fn human_message(fields: MessageFields) -> Result<Message> {
    Ok(message(MessageKind::Human, fields))
}

fn ai_message(fields: MessageFields) -> Result<Message> {
    Ok(message(MessageKind::Ai, fields))
}

fn system_message(fields: MessageFields) -> Result<Message> {
    Ok(message(MessageKind::System, fields))
}

fn developer_message(fields: MessageFields) -> Result<Message> {
    Ok(message(MessageKind::System, mark_developer(fields)))
}

fn tool_message(fields: MessageFields) -> Result<Message> {
    require(MessageKind::Tool, "tool_call_id", &fields.tool_call_id)?;
    Ok(message(MessageKind::Tool, fields))
}

fn function_message(fields: MessageFields) -> Result<Message> {
    require(MessageKind::Function, "name", &fields.name)?;
    Ok(message(MessageKind::Function, fields))
}

fn generic_message(fields: MessageFields) -> Result<Message> {
    require(MessageKind::Generic, "role", &fields.role)?;
    Ok(message(MessageKind::Generic, fields))
}

fn remove_message(fields: MessageFields) -> Result<Message> {
    Ok(message(MessageKind::Remove, fields))
}

// --- Chunks ---

fn human_chunk(fields: MessageFields) -> Result<MessageChunk> {
    Ok(chunk(MessageKind::Human, fields))
}

fn ai_chunk(fields: MessageFields) -> Result<MessageChunk> {
    let tool_call_chunks: Vec<ToolCallChunk> = fields
        .tool_calls
        .iter()
        .map(|call| ToolCallChunk {
            id: call.id.clone(),
            name: Some(call.name.clone()),
            args: Some(match &call.args {
                serde_json::Value::Null => "{}".to_string(),
                args => args.to_string(),
            }),
            index: None,
        })
        .collect();
    let mut chunk = chunk(MessageKind::Ai, fields);
    chunk.tool_call_chunks = tool_call_chunks;
    Ok(chunk)
}

fn system_chunk(fields: MessageFields) -> Result<MessageChunk> {
    Ok(chunk(MessageKind::System, fields))
}

fn developer_chunk(fields: MessageFields) -> Result<MessageChunk> {
    Ok(chunk(MessageKind::System, mark_developer(fields)))
}

fn tool_chunk(fields: MessageFields) -> Result<MessageChunk> {
    require(MessageKind::Tool, "tool_call_id", &fields.tool_call_id)?;
    Ok(chunk(MessageKind::Tool, fields))
}

fn function_chunk(fields: MessageFields) -> Result<MessageChunk> {
    Ok(chunk(MessageKind::Function, fields))
}

fn generic_chunk(fields: MessageFields) -> Result<MessageChunk> {
    require(MessageKind::Generic, "role", &fields.role)?;
    Ok(chunk(MessageKind::Generic, fields))
}

fn remove_chunk(_fields: MessageFields) -> Result<MessageChunk> {
    Err(Error::UnsupportedConversion(
        "remove messages have no chunk representation".into(),
    ))
}

impl Message {
    /// Convert into the streaming chunk of the same kind.
    pub fn to_chunk(&self) -> Result<MessageChunk> {
        to_chunk(self.kind, self.fields.clone())
    }
}
