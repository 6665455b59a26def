//! Streaming message chunks and the merge rules that reassemble them.
//!
//! A [`MessageChunk`] is a partial message emitted while a model response is
//! streaming. Chunks of the same kind fold into one with
//! [`MessageChunk::concat`]:
//!
//! - string content concatenates; mixed string/list content promotes the
//!   string to a text block
//! - metadata maps merge recursively (nested maps merge, arrays append,
//!   scalars take the last non-empty value)
//! - usage counters sum
//! - tool call fragments merge by `index`, then collapse into parsed
//!   [`ToolCall`]s or [`InvalidToolCall`]s
//! - `id`, `name`, `tool_call_id` and `role` keep the first non-empty value

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::message::{
    Content, ContentBlock, InvalidToolCall, Message, MessageFields, MessageKind, Metadata,
    ToolCall, ToolCallChunk, UsageMetadata,
};
use crate::registry;

/// A partial message emitted during streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChunk")]
pub struct MessageChunk {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(flatten)]
    pub fields: MessageFields,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_chunks: Vec<ToolCallChunk>,
}

/// Wire shape of a chunk. The tag stays a string so unknown kinds surface as
/// [`Error::UnrecognizedChunkKind`].
#[derive(Deserialize)]
struct RawChunk {
    #[serde(rename = "type")]
    kind: String,

    #[serde(flatten)]
    fields: MessageFields,

    #[serde(default)]
    tool_call_chunks: Vec<ToolCallChunk>,
}

impl TryFrom<RawChunk> for MessageChunk {
    type Error = Error;

    fn try_from(raw: RawChunk) -> Result<Self> {
        let entry = registry::lookup_tag(&raw.kind)?;
        let mut chunk = (entry.to_chunk)(raw.fields)?;
        if !raw.tool_call_chunks.is_empty() {
            chunk.tool_call_chunks = raw.tool_call_chunks;
            let (tool_calls, invalid_tool_calls) = collapse_tool_call_chunks(&chunk.tool_call_chunks);
            chunk.fields.tool_calls = tool_calls;
            chunk.fields.invalid_tool_calls = invalid_tool_calls;
        }
        Ok(chunk)
    }
}

impl MessageChunk {
    /// An empty chunk of the given kind.
    pub fn new(kind: MessageKind, content: impl Into<Content>) -> Self {
        Self {
            kind,
            fields: MessageFields::new(content),
            tool_call_chunks: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.fields.id = Some(id.into());
        self
    }

    pub fn with_tool_call_chunk(mut self, chunk: ToolCallChunk) -> Self {
        self.tool_call_chunks.push(chunk);
        self
    }

    /// Parse a chunk from an untyped JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawChunk = serde_json::from_value(value)?;
        MessageChunk::try_from(raw)
    }

    /// Merge `other` onto the end of this chunk.
    pub fn concat(&self, other: &MessageChunk) -> Result<MessageChunk> {
        if self.kind != other.kind {
            return Err(Error::KindMismatch {
                left: self.kind,
                right: other.kind,
            });
        }

        let left = &self.fields;
        let right = &other.fields;

        let tool_call_chunks = merge_tool_call_chunks(&self.tool_call_chunks, &other.tool_call_chunks);
        let (tool_calls, invalid_tool_calls) = if tool_call_chunks.is_empty() {
            (
                [left.tool_calls.as_slice(), right.tool_calls.as_slice()].concat(),
                [left.invalid_tool_calls.as_slice(), right.invalid_tool_calls.as_slice()].concat(),
            )
        } else {
            collapse_tool_call_chunks(&tool_call_chunks)
        };

        let usage_metadata = match (left.usage_metadata, right.usage_metadata) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };

        let fields = MessageFields {
            content: merge_content(&left.content, &right.content),
            id: first_non_empty(&left.id, &right.id),
            name: first_non_empty(&left.name, &right.name),
            tool_call_id: first_non_empty(&left.tool_call_id, &right.tool_call_id),
            tool_calls,
            invalid_tool_calls,
            role: first_non_empty(&left.role, &right.role),
            additional_kwargs: merge_maps(&left.additional_kwargs, &right.additional_kwargs),
            response_metadata: merge_maps(&left.response_metadata, &right.response_metadata),
            usage_metadata,
        };

        Ok(MessageChunk {
            kind: self.kind,
            fields,
            tool_call_chunks,
        })
    }

    /// Convert back into a complete message of the same kind.
    pub fn to_message(&self) -> Result<Message> {
        registry::to_message(self.kind, self.fields.clone())
    }

    pub fn into_message(self) -> Result<Message> {
        registry::to_message(self.kind, self.fields)
    }

    pub fn usage(&self) -> Option<UsageMetadata> {
        self.fields.usage_metadata
    }
}

/// Fold an ordered sequence of chunks. Returns `None` for empty input.
pub fn concat_chunks<I>(chunks: I) -> Result<Option<MessageChunk>>
where
    I: IntoIterator<Item = MessageChunk>,
{
    let mut merged: Option<MessageChunk> = None;
    for chunk in chunks {
        merged = Some(match merged {
            None => chunk,
            Some(acc) => acc.concat(&chunk)?,
        });
    }
    Ok(merged)
}

/// Fold a chunk stream as it arrives. Returns `None` if the stream was empty.
pub async fn collect_chunk_stream<S>(stream: S) -> Result<Option<MessageChunk>>
where
    S: Stream<Item = MessageChunk>,
{
    futures::pin_mut!(stream);
    let mut merged: Option<MessageChunk> = None;
    let mut received = 0usize;
    while let Some(chunk) = stream.next().await {
        received += 1;
        merged = Some(match merged {
            None => chunk,
            Some(acc) => acc.concat(&chunk)?,
        });
    }
    tracing::debug!(chunks = received, "Reassembled chunk stream");
    Ok(merged)
}

fn first_non_empty(left: &Option<String>, right: &Option<String>) -> Option<String> {
    match left {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => match right {
            Some(value) if !value.is_empty() => Some(value.clone()),
            _ => left.clone().or_else(|| right.clone()),
        },
    }
}

/// Concatenate two contents, promoting a string to a text block when the
/// other side is a list. Empty strings disappear.
pub fn merge_content(left: &Content, right: &Content) -> Content {
    match (left, right) {
        (Content::Text(a), Content::Text(b)) => Content::Text(format!("{a}{b}")),
        (Content::Text(a), Content::Blocks(bs)) => {
            let mut blocks = Vec::with_capacity(bs.len() + 1);
            if !a.is_empty() {
                blocks.push(ContentBlock::text(a.clone()));
            }
            blocks.extend(bs.iter().cloned());
            Content::Blocks(blocks)
        }
        (Content::Blocks(as_), Content::Text(b)) => {
            let mut blocks = as_.clone();
            if !b.is_empty() {
                blocks.push(ContentBlock::text(b.clone()));
            }
            Content::Blocks(blocks)
        }
        (Content::Blocks(as_), Content::Blocks(bs)) => Content::Blocks([as_.as_slice(), bs.as_slice()].concat()),
    }
}

/// Merge two metadata maps. Nested maps merge, arrays append, and scalars
/// take the right-hand value unless it is null or an empty string.
pub fn merge_maps(left: &Metadata, right: &Metadata) -> Metadata {
    let mut merged = left.clone();
    for (key, incoming) in right {
        match merged.get_mut(key) {
            Some(existing) => merge_value(existing, incoming),
            None => {
                merged.insert(key.clone(), incoming.clone());
            }
        }
    }
    merged
}

fn merge_value(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Object(left), Value::Object(right)) => {
            *left = merge_maps(left, right);
        }
        (Value::Array(left), Value::Array(right)) => left.extend(right.iter().cloned()),
        (_, Value::Null) => {}
        (_, Value::String(s)) if s.is_empty() => {}
        (slot, value) => *slot = value.clone(),
    }
}

/// Merge fragment lists. Fragments sharing an `index` combine: argument text
/// appends, `id` and `name` take the latest non-empty value. Fragments
/// without an index are kept as separate calls.
pub fn merge_tool_call_chunks(left: &[ToolCallChunk], right: &[ToolCallChunk]) -> Vec<ToolCallChunk> {
    let mut merged = left.to_vec();
    for incoming in right {
        let existing = incoming
            .index
            .and_then(|index| merged.iter_mut().find(|chunk| chunk.index == Some(index)));
        match existing {
            Some(existing) => {
                if let Some(args) = &incoming.args {
                    existing.args.get_or_insert_with(String::new).push_str(args);
                }
                if incoming.id.as_deref().is_some_and(|id| !id.is_empty()) {
                    existing.id = incoming.id.clone();
                }
                if incoming.name.as_deref().is_some_and(|name| !name.is_empty()) {
                    existing.name = incoming.name.clone();
                }
            }
            None => merged.push(incoming.clone()),
        }
    }
    merged
}

/// Turn fragments into finished calls. Arguments that do not parse into a
/// JSON object (even after closing open strings and brackets) become
/// invalid calls carrying the raw text.
pub fn collapse_tool_call_chunks(chunks: &[ToolCallChunk]) -> (Vec<ToolCall>, Vec<InvalidToolCall>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for chunk in chunks {
        let raw = chunk.args.clone().unwrap_or_default();
        let parsed = if raw.trim().is_empty() {
            Some(Value::Object(serde_json::Map::new()))
        } else {
            parse_partial_json(&raw)
        };
        match parsed {
            Some(args @ Value::Object(_)) => valid.push(ToolCall {
                id: chunk.id.clone(),
                name: chunk.name.clone().unwrap_or_default(),
                args,
            }),
            _ => invalid.push(InvalidToolCall {
                id: chunk.id.clone(),
                name: chunk.name.clone(),
                args: Some(raw),
                error: None,
            }),
        }
    }
    (valid, invalid)
}

/// Parse JSON that may have been cut off mid-stream by closing any open
/// string, dropping a dangling comma and closing open brackets.
pub fn parse_partial_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut repaired = String::with_capacity(text.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else {
            match ch {
                '"' => in_string = true,
                '{' => closers.push('}'),
                '[' => closers.push(']'),
                '}' | ']' => {
                    if closers.pop() != Some(ch) {
                        return None;
                    }
                }
                _ => {}
            }
        }
        repaired.push(ch);
    }

    if in_string {
        if escaped {
            repaired.pop();
        }
        repaired.push('"');
    }

    let trimmed_len = repaired.trim_end().len();
    repaired.truncate(trimmed_len);
    if repaired.ends_with(',') {
        repaired.pop();
    } else if repaired.ends_with(':') {
        repaired.push_str("null");
    }

    while let Some(closer) = closers.pop() {
        repaired.push(closer);
    }

    serde_json::from_str(&repaired).ok()
}
