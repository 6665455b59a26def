//! Error types for the Chatloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Every variant is a
//! contract violation raised at the point it is detected; nothing here is
//! retried or recovered internally.

use thiserror::Error;

use crate::message::MessageKind;

/// The top-level error type for all Chatloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Kind resolution ---
    #[error("Invalid message type specifier: '{0}'")]
    InvalidTypeSpecifier(String),

    #[error("Unrecognized message chunk kind '{kind}'. Supported kinds are {supported}")]
    UnrecognizedChunkKind { kind: String, supported: String },

    // --- Registry / conversion ---
    #[error("Can not build a {kind} message without the '{field}' field")]
    MissingDiscriminantField { kind: MessageKind, field: &'static str },

    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    #[error("Can not merge a {left} chunk with a {right} chunk")]
    KindMismatch { left: MessageKind, right: MessageKind },

    // --- Option validation ---
    #[error("Invalid option combination: {0}")]
    InvalidOptionCombination(String),

    #[error("Unrecognized strategy: '{0}'. Must be one of 'first' or 'last'")]
    UnrecognizedStrategy(String),

    // --- Collaborators (token counters, text splitters) ---
    #[error("Collaborator '{name}' failed: {reason}")]
    Collaborator { name: String, reason: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a failure reported by a caller-supplied collaborator.
    pub fn collaborator(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
