//! Keep or drop messages by name, kind and id.

use async_trait::async_trait;
use chatloom_core::{Message, MessageKind, Result, parse_kinds};
use tracing::debug;

use crate::transform::MessageTransform;

/// Include and exclude sets. `None` means the criterion was not supplied;
/// `Some(vec![])` is a supplied set that matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub include_names: Option<Vec<String>>,
    pub exclude_names: Option<Vec<String>>,
    pub include_types: Option<Vec<MessageKind>>,
    pub exclude_types: Option<Vec<MessageKind>>,
    pub include_ids: Option<Vec<String>>,
    pub exclude_ids: Option<Vec<String>>,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_names = Some(strings(names));
        self
    }

    pub fn exclude_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_names = Some(strings(names));
        self
    }

    pub fn include_types(mut self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.include_types = Some(kinds.into_iter().collect());
        self
    }

    pub fn exclude_types(mut self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.exclude_types = Some(kinds.into_iter().collect());
        self
    }

    /// Like [`include_types`](Self::include_types) but from specifier
    /// strings such as `"human"` or `"AIMessage"`.
    pub fn include_types_from<I, S>(self, specifiers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.include_types(parse_kinds(specifiers)?))
    }

    pub fn exclude_types_from<I, S>(self, specifiers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.exclude_types(parse_kinds(specifiers)?))
    }

    pub fn include_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_ids = Some(strings(ids));
        self
    }

    pub fn exclude_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids = Some(strings(ids));
        self
    }

    fn has_includes(&self) -> bool {
        self.include_names.is_some() || self.include_types.is_some() || self.include_ids.is_some()
    }

    /// Whether a single message survives the filter.
    pub fn keeps(&self, message: &Message) -> bool {
        if matches_value(&self.exclude_names, message.name())
            || matches_kind(&self.exclude_types, message.kind)
            || matches_value(&self.exclude_ids, message.id())
        {
            return false;
        }

        if !self.has_includes() {
            return true;
        }

        matches_value(&self.include_names, message.name())
            || matches_kind(&self.include_types, message.kind)
            || matches_value(&self.include_ids, message.id())
    }
}

fn matches_value(set: &Option<Vec<String>>, value: Option<&str>) -> bool {
    match (set, value) {
        (Some(set), Some(value)) => set.iter().any(|candidate| candidate == value),
        _ => false,
    }
}

fn matches_kind(set: &Option<Vec<MessageKind>>, kind: MessageKind) -> bool {
    set.as_ref().is_some_and(|set| set.contains(&kind))
}

/// Return the messages that pass `options`, in their original order.
pub fn filter_messages(messages: &[Message], options: &FilterOptions) -> Vec<Message> {
    let kept: Vec<Message> = messages
        .iter()
        .filter(|message| options.keeps(message))
        .cloned()
        .collect();
    debug!(input = messages.len(), output = kept.len(), "Filtered messages");
    kept
}

/// Deferred form of [`filter_messages`].
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    options: FilterOptions,
}

impl MessageFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }
}

#[async_trait]
impl MessageTransform for MessageFilter {
    fn name(&self) -> &str {
        "filter"
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        Ok(filter_messages(&messages, &self.options))
    }
}
