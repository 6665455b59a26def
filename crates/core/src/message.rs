//! Message domain types.
//!
//! A [`Message`] is one complete turn in a conversation. It carries exactly one
//! [`MessageKind`] plus a shared bag of [`MessageFields`]; which fields are
//! mandatory depends on the kind and is enforced by the
//! [registry](crate::registry) whenever a message is built from raw fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry;

/// Free-form metadata bag (`additional_kwargs`, `response_metadata`).
pub type Metadata = serde_json::Map<String, Value>;

/// The role category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MessageKind {
    /// The end user
    Human,
    /// The model
    Ai,
    /// System instructions
    System,
    /// OpenAI-style developer instructions; materialized as `System`
    Developer,
    /// Tool execution result
    Tool,
    /// Legacy function-call result
    Function,
    /// Message with an arbitrary caller-chosen role
    Generic,
    /// Deletion marker for a message id
    Remove,
}

impl MessageKind {
    /// Every kind, in registry order.
    pub const ALL: [MessageKind; 8] = [
        MessageKind::Human,
        MessageKind::Ai,
        MessageKind::System,
        MessageKind::Developer,
        MessageKind::Tool,
        MessageKind::Function,
        MessageKind::Generic,
        MessageKind::Remove,
    ];

    /// The canonical discriminant string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Human => "human",
            MessageKind::Ai => "ai",
            MessageKind::System => "system",
            MessageKind::Developer => "developer",
            MessageKind::Tool => "tool",
            MessageKind::Function => "function",
            MessageKind::Generic => "generic",
            MessageKind::Remove => "remove",
        }
    }

    /// Position of this kind in [`MessageKind::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a type specifier to its canonical kind.
///
/// Accepts the canonical names, the role aliases `user` / `assistant` / `chat`,
/// and class-style handles such as `HumanMessage` or `AIMessageChunk`, which
/// all collapse to the kind they construct.
impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "human" | "user" | "HumanMessage" | "HumanMessageChunk" => MessageKind::Human,
            "ai" | "assistant" | "AIMessage" | "AIMessageChunk" => MessageKind::Ai,
            "system" | "SystemMessage" | "SystemMessageChunk" => MessageKind::System,
            "developer" => MessageKind::Developer,
            "tool" | "ToolMessage" | "ToolMessageChunk" => MessageKind::Tool,
            "function" | "FunctionMessage" | "FunctionMessageChunk" => MessageKind::Function,
            "generic" | "chat" | "ChatMessage" | "ChatMessageChunk" => MessageKind::Generic,
            "remove" | "RemoveMessage" => MessageKind::Remove,
            other => return Err(Error::InvalidTypeSpecifier(other.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for MessageKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Parse a list of type specifiers, failing on the first unknown token.
pub fn parse_kinds<I, S>(specifiers: I) -> Result<Vec<MessageKind>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    specifiers
        .into_iter()
        .map(|s| s.as_ref().parse())
        .collect()
}

/// One element of list-shaped message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ContentBlock {
    /// `{"type": "text", "text": ...}`
    Text(String),
    /// `{"type": "image_url", "image_url": ...}`
    ImageUrl(Value),
    /// Any provider-specific block, kept verbatim
    Other(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Value> for ContentBlock {
    fn from(value: Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("text") => match value.get("text").and_then(Value::as_str) {
                Some(text) => ContentBlock::Text(text.to_string()),
                None => ContentBlock::Other(value),
            },
            Some("image_url") => match value.get("image_url") {
                Some(image_url) => ContentBlock::ImageUrl(image_url.clone()),
                None => ContentBlock::Other(value),
            },
            _ => ContentBlock::Other(value),
        }
    }
}

impl From<ContentBlock> for Value {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text(text) => serde_json::json!({ "type": "text", "text": text }),
            ContentBlock::ImageUrl(image_url) => {
                serde_json::json!({ "type": "image_url", "image_url": image_url })
            }
            ContentBlock::Other(value) => value,
        }
    }
}

/// Message content: a plain string or an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<ContentBlock>> for Content {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Content::Blocks(blocks)
    }
}

impl Content {
    pub fn is_text(&self) -> bool {
        matches!(self, Content::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Blocks(_) => None,
        }
    }

    pub fn blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            Content::Text(_) => None,
            Content::Blocks(blocks) => Some(blocks),
        }
    }

    /// Text that can be split for partial inclusion: the string itself, or
    /// the first non-empty text block. Empty text yields `None`.
    pub fn extractable_text(&self) -> Option<&str> {
        let text = match self {
            Content::Text(text) => Some(text.as_str()),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .find(|text| !text.is_empty()),
        };
        text.filter(|text| !text.is_empty())
    }

    /// All text carried by this content, text blocks concatenated in order.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks.iter().filter_map(ContentBlock::as_text).collect(),
        }
    }
}

/// A complete tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Parsed argument object
    #[serde(default = "empty_args")]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            args,
        }
    }
}

/// A tool call whose streamed arguments could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A streamed tool call fragment. `index` identifies the logical call the
/// fragment belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw (possibly incomplete) JSON argument text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Token usage reported alongside a model response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl std::ops::Add for UsageMetadata {
    type Output = UsageMetadata;

    fn add(self, rhs: UsageMetadata) -> UsageMetadata {
        UsageMetadata {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

/// The field bag every message and chunk is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFields {
    #[serde(default)]
    pub content: Content,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Required for `tool`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_tool_calls: Vec<InvalidToolCall>,

    /// Required for `generic`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub additional_kwargs: Metadata,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub response_metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl MessageFields {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// A single complete message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    /// Discriminant; serialized as `type`
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(flatten)]
    pub fields: MessageFields,
}

/// Wire shape of a message before registry validation.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: MessageKind,

    #[serde(flatten)]
    fields: MessageFields,
}

impl TryFrom<RawMessage> for Message {
    type Error = Error;

    fn try_from(raw: RawMessage) -> Result<Self> {
        registry::to_message(raw.kind, raw.fields)
    }
}

impl Message {
    /// Build a message of any kind from raw fields, validating the
    /// kind-specific requirements.
    pub fn from_fields(kind: MessageKind, fields: MessageFields) -> Result<Self> {
        registry::to_message(kind, fields)
    }

    /// Create a new human message.
    pub fn human(content: impl Into<Content>) -> Self {
        Self::plain(MessageKind::Human, content)
    }

    /// Create a new AI message.
    pub fn ai(content: impl Into<Content>) -> Self {
        Self::plain(MessageKind::Ai, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self::plain(MessageKind::System, content)
    }

    /// Create a system message tagged as developer instructions.
    pub fn developer(content: impl Into<Content>) -> Self {
        Self {
            kind: MessageKind::System,
            fields: registry::mark_developer(MessageFields::new(content)),
        }
    }

    /// Create a tool result message.
    pub fn tool(content: impl Into<Content>, tool_call_id: impl Into<String>) -> Self {
        let mut fields = MessageFields::new(content);
        fields.tool_call_id = Some(tool_call_id.into());
        Self {
            kind: MessageKind::Tool,
            fields,
        }
    }

    /// Create a function result message.
    pub fn function(content: impl Into<Content>, name: impl Into<String>) -> Self {
        let mut fields = MessageFields::new(content);
        fields.name = Some(name.into());
        Self {
            kind: MessageKind::Function,
            fields,
        }
    }

    /// Create a message with a caller-chosen role.
    pub fn generic(content: impl Into<Content>, role: impl Into<String>) -> Self {
        let mut fields = MessageFields::new(content);
        fields.role = Some(role.into());
        Self {
            kind: MessageKind::Generic,
            fields,
        }
    }

    /// Create a deletion marker for the message with the given id.
    pub fn remove(id: impl Into<String>) -> Self {
        Self::plain(MessageKind::Remove, "").with_id(id)
    }

    fn plain(kind: MessageKind, content: impl Into<Content>) -> Self {
        Self {
            kind,
            fields: MessageFields::new(content),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.fields.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.fields.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.fields.tool_calls = tool_calls;
        self
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.fields.usage_metadata = Some(usage);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.additional_kwargs.insert(key.into(), value);
        self
    }

    pub fn content(&self) -> &Content {
        &self.fields.content
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.name.as_deref()
    }

    /// True for system messages built from the `developer` kind.
    pub fn is_developer(&self) -> bool {
        self.kind == MessageKind::System && registry::is_developer(&self.fields)
    }

    /// Copy of this message with its content replaced, rebuilt through the
    /// registry.
    pub fn with_content(&self, content: impl Into<Content>) -> Result<Self> {
        let mut fields = self.fields.clone();
        fields.content = content.into();
        registry::to_message(self.kind, fields)
    }
}
