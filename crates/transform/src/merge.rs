//! Fold runs of adjacent same-kind messages into single messages.

use async_trait::async_trait;
use chatloom_core::{Content, Message, MessageKind, Result};
use tracing::debug;

use crate::transform::MessageTransform;

/// Merge each run of adjacent messages of the same kind.
///
/// Tool messages are never merged since each answers a distinct call. Two
/// string contents are joined with `"\n"`; anything else follows the chunk
/// merge rules (lists concatenate, ids keep the first non-empty value, tool
/// calls accumulate).
pub fn merge_message_runs(messages: &[Message]) -> Result<Vec<Message>> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());

    for current in messages {
        let Some(last) = merged.last_mut() else {
            merged.push(current.clone());
            continue;
        };

        if current.kind == MessageKind::Tool || current.kind != last.kind {
            merged.push(current.clone());
            continue;
        }

        let mut combined = last.to_chunk()?.concat(&current.to_chunk()?)?;
        if let (Content::Text(a), Content::Text(b)) = (last.content(), current.content()) {
            combined.fields.content = Content::Text(format!("{a}\n{b}"));
        }
        *last = combined.into_message()?;
    }

    debug!(input = messages.len(), output = merged.len(), "Merged message runs");
    Ok(merged)
}

/// Deferred form of [`merge_message_runs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunMerger;

#[async_trait]
impl MessageTransform for RunMerger {
    fn name(&self) -> &str {
        "merge"
    }

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        merge_message_runs(&messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatloom_core::{ContentBlock, Error, ToolCall};
    use serde_json::json;

    #[test]
    fn adjacent_strings_join_with_newline() {
        let merged = merge_message_runs(&[Message::human("a"), Message::human("b")]).unwrap();
        assert_eq!(merged, vec![Message::human("a\nb")]);
    }

    #[test]
    fn mixed_history_merges_per_run() {
        let messages = vec![
            Message::system("you're a good assistant."),
            Message::human("what's your favorite color").with_id("foo"),
            Message::human("wait your favorite food").with_id("bar"),
            Message::ai("my favorite colo")
                .with_id("baz")
                .with_tool_calls(vec![ToolCall::new("123", "blah_tool", json!({"x": 2}))]),
            Message::ai(vec![ContentBlock::text("my favorite dish is lasagna")])
                .with_id("blur")
                .with_tool_calls(vec![ToolCall::new("456", "blah_tool", json!({"x": -10}))]),
        ];

        let merged = merge_message_runs(&messages).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], messages[0]);

        assert_eq!(
            merged[1].content().as_text(),
            Some("what's your favorite color\nwait your favorite food")
        );
        assert_eq!(merged[1].id(), Some("foo"));

        assert_eq!(merged[2].id(), Some("baz"));
        assert_eq!(
            merged[2].content(),
            &Content::Blocks(vec![
                ContentBlock::text("my favorite colo"),
                ContentBlock::text("my favorite dish is lasagna"),
            ])
        );
        let calls = &merged[2].fields.tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("123"));
        assert_eq!(calls[1].args, json!({"x": -10}));
    }

    #[test]
    fn argless_tool_call_survives_merge() {
        let messages: Vec<Message> = serde_json::from_value(json!([
            {"type": "ai", "content": "x", "tool_calls": [{"id": "c1", "name": "ping"}]},
            {"type": "ai", "content": "y"}
        ]))
        .unwrap();
        let merged = merge_message_runs(&messages).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content().as_text(), Some("x\ny"));
        assert_eq!(merged[0].fields.tool_calls, vec![ToolCall::new("c1", "ping", json!({}))]);
        assert!(merged[0].fields.invalid_tool_calls.is_empty());
    }

    #[test]
    fn null_args_merge_as_empty_object() {
        let messages = vec![
            Message::ai("x").with_tool_calls(vec![ToolCall::new("c1", "ping", serde_json::Value::Null)]),
            Message::ai("y"),
        ];
        let merged = merge_message_runs(&messages).unwrap();
        assert_eq!(merged[0].fields.tool_calls, vec![ToolCall::new("c1", "ping", json!({}))]);
        assert!(merged[0].fields.invalid_tool_calls.is_empty());
    }

    #[test]
    fn tool_messages_stay_separate() {
        let messages = vec![Message::tool("1", "a"), Message::tool("2", "b")];
        assert_eq!(merge_message_runs(&messages).unwrap(), messages);
    }

    #[test]
    fn merging_is_idempotent() {
        let messages = vec![
            Message::human("a"),
            Message::human("b"),
            Message::ai("c"),
            Message::tool("d", "call"),
            Message::ai("e"),
            Message::ai("f"),
        ];
        let once = merge_message_runs(&messages).unwrap();
        let twice = merge_message_runs(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn empty_input() {
        assert!(merge_message_runs(&[]).unwrap().is_empty());
    }

    #[test]
    fn adjacent_removals_have_no_chunk_form() {
        let err = merge_message_runs(&[Message::remove("a"), Message::remove("b")]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion(_)));
    }
}
