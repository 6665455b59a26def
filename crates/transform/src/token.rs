//! Token counting collaborators.
//!
//! The trimmer never tokenizes anything itself; it asks a [`TokenCounter`]
//! for the size of candidate message lists. Counters may be backed by a real
//! tokenizer service, so the trait is async.

use async_trait::async_trait;
use chatloom_core::{Content, Message, MessageKind, Result, get_buffer_string};

/// Counts the tokens a list of messages would occupy.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count(&self, messages: &[Message]) -> Result<usize>;
}

/// Counts tokens for a single piece of content, typically a model's own
/// tokenizer. Wrap in [`PerMessageCounter`] to count whole lists.
#[async_trait]
pub trait ContentTokenizer: Send + Sync {
    async fn num_tokens(&self, content: &Content) -> Result<usize>;
}

/// Adapts a plain synchronous closure.
pub struct FnTokenCounter<F> {
    count: F,
}

impl<F> FnTokenCounter<F>
where
    F: Fn(&[Message]) -> usize + Send + Sync,
{
    pub fn new(count: F) -> Self {
        Self { count }
    }
}

#[async_trait]
impl<F> TokenCounter for FnTokenCounter<F>
where
    F: Fn(&[Message]) -> usize + Send + Sync,
{
    async fn count(&self, messages: &[Message]) -> Result<usize> {
        Ok((self.count)(messages))
    }
}

/// Sums a per-content tokenizer over every message, one call at a time.
pub struct PerMessageCounter<T> {
    tokenizer: T,
}

impl<T: ContentTokenizer> PerMessageCounter<T> {
    pub fn new(tokenizer: T) -> Self {
        Self { tokenizer }
    }
}

#[async_trait]
impl<T: ContentTokenizer> TokenCounter for PerMessageCounter<T> {
    async fn count(&self, messages: &[Message]) -> Result<usize> {
        let mut total = 0;
        for message in messages {
            total += self.tokenizer.num_tokens(message.content()).await?;
        }
        Ok(total)
    }
}

/// Character heuristic: roughly `chars_per_token` characters per token plus
/// a fixed overhead per message for role and delimiters.
#[derive(Debug, Clone, Copy)]
pub struct CharEstimateCounter {
    chars_per_token: usize,
    message_overhead: usize,
}

impl Default for CharEstimateCounter {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            message_overhead: 4,
        }
    }
}

impl CharEstimateCounter {
    /// `chars_per_token` is clamped to at least 1.
    pub fn new(chars_per_token: usize, message_overhead: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            message_overhead,
        }
    }

    /// Estimate the token count for a string. Rounds up.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(self.chars_per_token)
    }

    /// Estimate one message: its rendered line, any tool calls serialized as
    /// JSON, and the per-message overhead.
    pub fn estimate_message(&self, message: &Message) -> Result<usize> {
        if message.kind == MessageKind::Remove {
            return Ok(self.message_overhead);
        }
        let rendered = get_buffer_string(std::slice::from_ref(message), "Human", "AI")?;
        let mut tokens = self.message_overhead + self.estimate_tokens(&rendered);
        if !message.fields.tool_calls.is_empty() {
            let calls = serde_json::to_string(&message.fields.tool_calls)?;
            tokens += self.estimate_tokens(&calls);
        }
        Ok(tokens)
    }
}

#[async_trait]
impl TokenCounter for CharEstimateCounter {
    async fn count(&self, messages: &[Message]) -> Result<usize> {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}
