//! # Chatloom Core
//!
//! Message domain types, the kind registry and the streaming chunk merge
//! engine. Every other Chatloom crate builds on the types defined here.
//!
//! ## Layout
//!
//! - [`message`]: messages, content, tool calls and kind specifiers
//! - [`registry`]: per-kind constructors and field validation
//! - [`chunk`]: streaming chunks and their merge rules
//! - [`buffer`]: plain-text rendering of a conversation

pub mod error;
pub mod message;
pub mod registry;
pub mod chunk;
pub mod buffer;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{
    Content, ContentBlock, InvalidToolCall, Message, MessageFields, MessageKind, Metadata,
    ToolCall, ToolCallChunk, UsageMetadata, parse_kinds,
};
pub use chunk::{MessageChunk, collect_chunk_stream, concat_chunks};
pub use buffer::get_buffer_string;
