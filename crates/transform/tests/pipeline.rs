//! Whole-history passes chained through a `Pipeline`.

use std::sync::Arc;

use async_trait::async_trait;
use chatloom_core::{
    Content, Error, Message, MessageChunk, MessageKind, Result, ToolCall, ToolCallChunk,
    collect_chunk_stream,
};
use chatloom_transform::{
    CharEstimateCounter, ContentTokenizer, FilterOptions, MessageFilter, PerMessageCounter,
    Pipeline, RunMerger, Strategy, TextSplitter, TrimOptions, Trimmer, filter_messages,
    merge_message_runs,
};
use serde_json::json;

fn support_history() -> Vec<Message> {
    vec![
        Message::system("You are a support agent."),
        Message::human("My order is late.").with_id("h1"),
        Message::human("It was due Monday.").with_id("h2"),
        Message::ai("")
            .with_id("a1")
            .with_tool_calls(vec![ToolCall::new("call_1", "track_order", json!({"order": 42}))]),
        Message::tool("In transit, arriving Friday.", "call_1").with_id("t1"),
        Message::ai("Your order arrives Friday.").with_id("a2"),
        Message::remove("stale"),
    ]
}

struct WordTokenizer;

#[async_trait]
impl ContentTokenizer for WordTokenizer {
    async fn num_tokens(&self, content: &Content) -> Result<usize> {
        Ok(content.to_text().split_whitespace().count())
    }
}

struct SentenceSplitter;

#[async_trait]
impl TextSplitter for SentenceSplitter {
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_inclusive(". ").map(String::from).collect())
    }
}

struct BrokenSplitter;

#[async_trait]
impl TextSplitter for BrokenSplitter {
    async fn split(&self, _text: &str) -> Result<Vec<String>> {
        Err(Error::collaborator("text_splitter", "model unavailable"))
    }
}

#[tokio::test]
async fn filter_merge_trim_pipeline() {
    let trimmer = Trimmer::new(
        TrimOptions::new(12, Arc::new(PerMessageCounter::new(WordTokenizer)))
            .include_system(true)
            .start_on([MessageKind::Human]),
    )
    .unwrap();

    let pipeline = Pipeline::new()
        .then(MessageFilter::new(
            FilterOptions::new().exclude_types([MessageKind::Remove, MessageKind::Tool]),
        ))
        .then(RunMerger)
        .then(trimmer);

    let out = pipeline.run(&support_history()).await.unwrap();

    // the merged human turn does not fit next to the system prompt, so
    // start_on leaves only the pinned system message
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, MessageKind::System);

    let roomier = Pipeline::new()
        .then(MessageFilter::new(
            FilterOptions::new().exclude_types([MessageKind::Remove, MessageKind::Tool]),
        ))
        .then(RunMerger)
        .then(
            Trimmer::new(
                TrimOptions::new(20, Arc::new(PerMessageCounter::new(WordTokenizer)))
                    .include_system(true)
                    .start_on([MessageKind::Human]),
            )
            .unwrap(),
        );
    let out = roomier.run(&support_history()).await.unwrap();
    let kinds: Vec<MessageKind> = out.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::System, MessageKind::Human, MessageKind::Ai]
    );
    assert_eq!(
        out[1].content().as_text(),
        Some("My order is late.\nIt was due Monday.")
    );
    assert_eq!(out[1].id(), Some("h1"));
    assert_eq!(out[2].fields.tool_calls.len(), 1);
}

#[tokio::test]
async fn filter_by_name_and_id() {
    let history = vec![
        Message::human("hi").with_name("alice").with_id("1"),
        Message::human("yo").with_name("bob").with_id("2"),
        Message::ai("hello").with_id("3"),
    ];
    let options = FilterOptions::new().include_names(["alice"]).include_ids(["3"]);
    let kept = filter_messages(&history, &options);
    assert_eq!(kept, vec![history[0].clone(), history[2].clone()]);
}

#[test]
fn merge_keeps_tool_results_apart() {
    let merged = merge_message_runs(&support_history()).unwrap();
    let kinds: Vec<MessageKind> = merged.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::System,
            MessageKind::Human,
            MessageKind::Ai,
            MessageKind::Tool,
            MessageKind::Ai,
            MessageKind::Remove,
        ]
    );
}

#[tokio::test]
async fn custom_splitter_drives_partial_text() {
    let history = vec![
        Message::human("Summarize the call."),
        Message::ai("First point. Second point. Third point."),
        Message::human("Thanks."),
    ];
    let options = TrimOptions::new(7, Arc::new(PerMessageCounter::new(WordTokenizer)))
        .strategy(Strategy::First)
        .allow_partial(true)
        .text_splitter(Arc::new(SentenceSplitter));
    let trimmed = chatloom_transform::trim_messages(&history, &options)
        .await
        .unwrap();
    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed[1].content().as_text(), Some("First point. Second point. "));
}

#[tokio::test]
async fn splitter_failure_propagates() {
    let history = vec![
        Message::human("a b c"),
        Message::ai("d e f\ng h i"),
        Message::human("j"),
    ];
    let options = TrimOptions::new(4, Arc::new(PerMessageCounter::new(WordTokenizer)))
        .strategy(Strategy::First)
        .allow_partial(true)
        .text_splitter(Arc::new(BrokenSplitter));
    let err = chatloom_transform::trim_messages(&history, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Collaborator { ref name, .. } if name == "text_splitter"));
}

#[tokio::test]
async fn estimator_budget_holds_for_rendered_history() {
    let counter = CharEstimateCounter::default();
    let history: Vec<Message> = support_history()
        .into_iter()
        .filter(|m| m.kind != MessageKind::Remove)
        .collect();
    let options = TrimOptions::new(30, Arc::new(counter)).include_system(true);
    let trimmed = chatloom_transform::trim_messages(&history, &options)
        .await
        .unwrap();
    let mut used = 0;
    for message in &trimmed {
        used += counter.estimate_message(message).unwrap();
    }
    assert!(used <= 30);
    assert_eq!(trimmed[0].kind, MessageKind::System);
}

#[tokio::test]
async fn streamed_reply_joins_a_history() {
    let fragments = vec![
        MessageChunk::new(MessageKind::Ai, "Let me ").with_id("run-1"),
        MessageChunk::new(MessageKind::Ai, "check.").with_tool_call_chunk(ToolCallChunk {
            id: Some("call_9".into()),
            name: Some("lookup".into()),
            args: Some(r#"{"sku": "#.into()),
            index: Some(0),
        }),
        MessageChunk::new(MessageKind::Ai, "").with_tool_call_chunk(ToolCallChunk {
            args: Some(r#""A-7"}"#.into()),
            index: Some(0),
            ..ToolCallChunk::default()
        }),
    ];
    let reply = collect_chunk_stream(futures::stream::iter(fragments))
        .await
        .unwrap()
        .unwrap()
        .into_message()
        .unwrap();

    assert_eq!(reply.id(), Some("run-1"));
    assert_eq!(reply.content().as_text(), Some("Let me check."));
    assert_eq!(reply.fields.tool_calls[0].args, json!({"sku": "A-7"}));

    let merged = merge_message_runs(&[Message::ai("Hello."), reply]).unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].content().as_text(), Some("Hello.\nLet me check."));
}
