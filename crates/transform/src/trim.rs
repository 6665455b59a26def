//! Token-budget trimming.
//!
//! [`trim_messages`] keeps the longest prefix (`first`) or suffix (`last`) of
//! a history whose token count fits `max_tokens`. With `allow_partial` the
//! first message that did not fit may be cut down and kept: list content
//! loses whole blocks, string content loses whole splitter segments.
//!
//! The `last` strategy is implemented as `first` over the reversed history,
//! so both share one scan.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chatloom_core::{Content, ContentBlock, Error, Message, MessageKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::splitter::{NewlineSplitter, TextSplitter};
use crate::token::TokenCounter;
use crate::transform::MessageTransform;

/// Which end of the history to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    First,
    #[default]
    Last,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::First => f.write_str("first"),
            Strategy::Last => f.write_str("last"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Strategy::First),
            "last" => Ok(Strategy::Last),
            other => Err(Error::UnrecognizedStrategy(other.to_string())),
        }
    }
}

/// Options for [`trim_messages`].
#[derive(Clone)]
pub struct TrimOptions {
    pub max_tokens: usize,
    pub token_counter: Arc<dyn TokenCounter>,
    pub strategy: Strategy,
    pub allow_partial: bool,
    /// Drop trailing messages until the last one has one of these kinds.
    pub end_on: Option<Vec<MessageKind>>,
    /// `last` only: drop leading messages until the first one has one of
    /// these kinds.
    pub start_on: Option<Vec<MessageKind>>,
    /// `last` only: always keep a leading system message.
    pub include_system: bool,
    /// Defaults to [`NewlineSplitter`].
    pub text_splitter: Option<Arc<dyn TextSplitter>>,
}

impl TrimOptions {
    pub fn new(max_tokens: usize, token_counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            max_tokens,
            token_counter,
            strategy: Strategy::default(),
            allow_partial: false,
            end_on: None,
            start_on: None,
            include_system: false,
            text_splitter: None,
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn end_on(mut self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.end_on = Some(kinds.into_iter().collect());
        self
    }

    pub fn start_on(mut self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.start_on = Some(kinds.into_iter().collect());
        self
    }

    pub fn include_system(mut self, include: bool) -> Self {
        self.include_system = include;
        self
    }

    pub fn text_splitter(mut self, splitter: Arc<dyn TextSplitter>) -> Self {
        self.text_splitter = Some(splitter);
        self
    }

    /// Reject option combinations that only make sense for `last`.
    pub fn validate(&self) -> Result<()> {
        if self.strategy == Strategy::First {
            if self.start_on.is_some() {
                return Err(Error::InvalidOptionCombination(
                    "start_on is only supported with strategy 'last'".into(),
                ));
            }
            if self.include_system {
                return Err(Error::InvalidOptionCombination(
                    "include_system is only supported with strategy 'last'".into(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TrimOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrimOptions")
            .field("max_tokens", &self.max_tokens)
            .field("strategy", &self.strategy)
            .field("allow_partial", &self.allow_partial)
            .field("end_on", &self.end_on)
            .field("start_on", &self.start_on)
            .field("include_system", &self.include_system)
            .field("custom_splitter", &self.text_splitter.is_some())
            .finish()
    }
}

/// Trim `messages` to fit `options.max_tokens`.
pub async fn trim_messages(messages: &[Message], options: &TrimOptions) -> Result<Vec<Message>> {
    options.validate()?;

    let default_splitter = NewlineSplitter;
    let splitter: &dyn TextSplitter = match &options.text_splitter {
        Some(splitter) => splitter.as_ref(),
        None => &default_splitter,
    };
    let scan = Scan {
        max_tokens: options.max_tokens,
        counter: options.token_counter.as_ref(),
        splitter,
    };

    let trimmed = match options.strategy {
        Strategy::First => {
            let partial = options.allow_partial.then_some(Strategy::First);
            scan.keep_first(messages.to_vec(), partial, options.end_on.as_deref(), 0)
                .await?
        }
        Strategy::Last => scan.keep_last(messages, options).await?,
    };

    debug!(
        input = messages.len(),
        output = trimmed.len(),
        strategy = %options.strategy,
        max_tokens = options.max_tokens,
        "Trimmed messages"
    );
    Ok(trimmed)
}

/// Shared state for one trim call.
struct Scan<'a> {
    max_tokens: usize,
    counter: &'a dyn TokenCounter,
    splitter: &'a dyn TextSplitter,
}

impl Scan<'_> {
    async fn count(&self, messages: &[Message]) -> Result<usize> {
        let count = self.counter.count(messages).await?;
        trace!(messages = messages.len(), count, "Counted tokens");
        Ok(count)
    }

    async fn fits_with(&self, prefix: &[Message], candidate: &Message) -> Result<bool> {
        let mut probe = Vec::with_capacity(prefix.len() + 1);
        probe.extend_from_slice(prefix);
        probe.push(candidate.clone());
        Ok(self.count(&probe).await? <= self.max_tokens)
    }

    /// Keep the longest prefix within budget, optionally followed by a cut
    /// down copy of the first excluded message. The first `pinned` messages
    /// are exempt from `end_on`.
    async fn keep_first(
        &self,
        messages: Vec<Message>,
        partial: Option<Strategy>,
        end_on: Option<&[MessageKind]>,
        pinned: usize,
    ) -> Result<Vec<Message>> {
        let total = messages.len();
        let mut cutoff = 0;
        for dropped in 0..total {
            if self.count(&messages[..total - dropped]).await? <= self.max_tokens {
                cutoff = total - dropped;
                break;
            }
        }
        debug!(cutoff, total, "Selected cutoff");

        let mut selected = messages[..cutoff].to_vec();

        if let Some(strategy) = partial {
            if cutoff + 1 < total {
                match self.partial(&selected, &messages[cutoff], strategy).await? {
                    Some(message) => {
                        debug!(index = cutoff, "Included partial message");
                        selected.push(message);
                    }
                    None => debug!(index = cutoff, "No partial form fits"),
                }
            }
        }

        if let Some(end_on) = end_on {
            drop_trailing_until(&mut selected, end_on, pinned);
        }
        Ok(selected)
    }

    async fn keep_last(&self, messages: &[Message], options: &TrimOptions) -> Result<Vec<Message>> {
        let mut working = messages.to_vec();
        if let Some(end_on) = options.end_on.as_deref() {
            drop_trailing_until(&mut working, end_on, 0);
        }

        let pin_system = options.include_system
            && working.first().is_some_and(|m| m.kind == MessageKind::System);

        let reversed = if pin_system {
            let mut rest = working.split_off(1);
            rest.reverse();
            working.extend(rest);
            working
        } else {
            working.reverse();
            working
        };

        let partial = options.allow_partial.then_some(Strategy::Last);
        let mut kept = self
            .keep_first(reversed, partial, options.start_on.as_deref(), usize::from(pin_system))
            .await?;

        if pin_system && !kept.is_empty() {
            let mut rest = kept.split_off(1);
            rest.reverse();
            kept.extend(rest);
        } else {
            kept.reverse();
        }
        Ok(kept)
    }

    /// Largest cut of `excluded` that still fits after `prefix`.
    async fn partial(
        &self,
        prefix: &[Message],
        excluded: &Message,
        strategy: Strategy,
    ) -> Result<Option<Message>> {
        if let Content::Blocks(blocks) = excluded.content() {
            if let Some(message) = self.partial_blocks(prefix, excluded, blocks, strategy).await? {
                return Ok(Some(message));
            }
        }
        match excluded.content().extractable_text() {
            Some(text) => self.partial_text(prefix, excluded, text, strategy).await,
            None => Ok(None),
        }
    }

    /// Grow a block prefix (`first`) or suffix (`last`) while it fits.
    async fn partial_blocks(
        &self,
        prefix: &[Message],
        excluded: &Message,
        blocks: &[ContentBlock],
        strategy: Strategy,
    ) -> Result<Option<Message>> {
        let mut ordered = blocks.to_vec();
        if strategy == Strategy::Last {
            ordered.reverse();
        }

        let mut best = None;
        for take in 1..=ordered.len() {
            let mut kept = ordered[..take].to_vec();
            if strategy == Strategy::Last {
                kept.reverse();
            }
            let candidate = excluded.with_content(Content::Blocks(kept))?;
            if !self.fits_with(prefix, &candidate).await? {
                break;
            }
            best = Some(candidate);
        }
        Ok(best)
    }

    /// Drop trailing (`first`) or leading (`last`) segments one at a time
    /// until the rest fits, keeping at least one segment.
    async fn partial_text(
        &self,
        prefix: &[Message],
        excluded: &Message,
        text: &str,
        strategy: Strategy,
    ) -> Result<Option<Message>> {
        let mut segments = self.splitter.split(text).await?;
        if strategy == Strategy::Last {
            segments.reverse();
        }

        for _ in 1..segments.len() {
            segments.pop();
            let text: String = match strategy {
                Strategy::First => segments.concat(),
                Strategy::Last => segments.iter().rev().map(String::as_str).collect(),
            };
            let candidate = excluded.with_content(text)?;
            if self.fits_with(prefix, &candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn drop_trailing_until(messages: &mut Vec<Message>, kinds: &[MessageKind], keep: usize) {
    while messages.len() > keep {
        match messages.last() {
            Some(last) if !kinds.contains(&last.kind) => {
                messages.pop();
            }
            _ => break,
        }
    }
}

/// Deferred form of [`trim_messages`]: configure once, apply to many
/// histories.
#[derive(Debug, Clone)]
pub struct Trimmer {
    options: TrimOptions,
}

impl Trimmer {
    pub fn new(options: TrimOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &TrimOptions {
        &self.options
    }

    pub async fn apply(&self, messages: &[Message]) -> Result<Vec<Message>> {
        trim_messages(messages, &self.options).await
    }
}

#[async_trait]
impl MessageTransform for Trimmer {
    fn name(&self) -> &str {
        "trim"
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        self.apply(&messages).await
    }
}
