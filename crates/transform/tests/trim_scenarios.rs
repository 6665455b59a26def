//! Trimming scenarios over a fixed five-message history.
//!
//! The counter charges 3 + 4 + 3 tokens for string content and
//! 3 + 4 per block + 3 for list content, so every string message costs 10
//! and the two-block AI message costs 14.

use std::sync::Arc;

use chatloom_core::{Content, ContentBlock, Message, MessageKind};
use chatloom_transform::{FnTokenCounter, Strategy, TokenCounter, TrimOptions, trim_messages};

const TEXT: &str = "This is a 4 token text. The full message is 10 tokens.";

fn block_counter() -> Arc<dyn TokenCounter> {
    Arc::new(FnTokenCounter::new(|messages: &[Message]| {
        messages
            .iter()
            .map(|m| match m.content() {
                Content::Text(_) => 10,
                Content::Blocks(blocks) => 6 + 4 * blocks.len(),
            })
            .sum()
    }))
}

fn history() -> Vec<Message> {
    vec![
        Message::system(TEXT),
        Message::human(TEXT).with_id("first"),
        Message::ai(vec![
            ContentBlock::text("This is the FIRST 4 token block."),
            ContentBlock::text("This is the SECOND 4 token block."),
        ])
        .with_id("second"),
        Message::human(TEXT).with_id("third"),
        Message::ai(TEXT).with_id("fourth"),
    ]
}

async fn count(messages: &[Message]) -> usize {
    block_counter().count(messages).await.unwrap()
}

#[tokio::test]
async fn first_30_without_partial() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter()).strategy(Strategy::First);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, messages[..2].to_vec());
}

#[tokio::test]
async fn first_30_with_partial_keeps_leading_block() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter())
        .strategy(Strategy::First)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();

    assert_eq!(trimmed.len(), 3);
    assert_eq!(trimmed[..2], messages[..2]);
    assert_eq!(trimmed[2].id(), Some("second"));
    assert_eq!(
        trimmed[2].content(),
        &Content::Blocks(vec![ContentBlock::text("This is the FIRST 4 token block.")])
    );
}

#[tokio::test]
async fn first_30_with_partial_ending_on_human() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter())
        .strategy(Strategy::First)
        .allow_partial(true)
        .end_on([MessageKind::Human]);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, messages[..2].to_vec());
}

#[tokio::test]
async fn last_30_with_system() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter()).include_system(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(
        trimmed,
        vec![messages[0].clone(), messages[3].clone(), messages[4].clone()]
    );
}

#[tokio::test]
async fn last_30_with_system_and_partial_has_no_room() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter())
        .include_system(true)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(
        trimmed,
        vec![messages[0].clone(), messages[3].clone(), messages[4].clone()]
    );
}

#[tokio::test]
async fn last_40_with_system_and_partial_keeps_trailing_block() {
    let messages = history();
    let options = TrimOptions::new(40, block_counter())
        .include_system(true)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();

    assert_eq!(trimmed.len(), 4);
    assert_eq!(trimmed[0], messages[0]);
    assert_eq!(trimmed[1].id(), Some("second"));
    assert_eq!(
        trimmed[1].content(),
        &Content::Blocks(vec![ContentBlock::text("This is the SECOND 4 token block.")])
    );
    assert_eq!(trimmed[2..], messages[3..]);
}

#[tokio::test]
async fn last_40_with_system_partial_and_start_on_human() {
    let messages = history();
    let options = TrimOptions::new(40, block_counter())
        .include_system(true)
        .allow_partial(true)
        .start_on([MessageKind::Human]);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(
        trimmed,
        vec![messages[0].clone(), messages[3].clone(), messages[4].clone()]
    );
}

#[tokio::test]
async fn last_40_without_system_starting_on_human() {
    let messages = history();
    let options = TrimOptions::new(40, block_counter())
        .allow_partial(true)
        .start_on([MessageKind::Human]);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, messages[3..].to_vec());
}

#[tokio::test]
async fn last_ending_on_human_drops_trailing_ai_first() {
    let messages = history();
    let options = TrimOptions::new(30, block_counter()).end_on([MessageKind::Human]);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    // end_on removes "fourth" before the budget scan
    assert_eq!(trimmed.last().and_then(Message::id), Some("third"));
    assert!(count(&trimmed).await <= 30);
}

#[tokio::test]
async fn three_message_budget_example() {
    let messages = vec![
        Message::system(TEXT),
        Message::human(TEXT).with_id("first"),
        Message::ai(TEXT).with_id("second"),
    ];

    let first = TrimOptions::new(20, block_counter()).strategy(Strategy::First);
    assert_eq!(
        trim_messages(&messages, &first).await.unwrap(),
        messages[..2].to_vec()
    );

    let last = TrimOptions::new(20, block_counter()).include_system(true);
    assert_eq!(
        trim_messages(&messages, &last).await.unwrap(),
        vec![messages[0].clone(), messages[2].clone()]
    );
}

#[tokio::test]
async fn oversized_first_message_yields_nothing() {
    let messages = history();
    let options = TrimOptions::new(5, block_counter())
        .strategy(Strategy::First)
        .allow_partial(true);
    assert!(trim_messages(&messages, &options).await.unwrap().is_empty());
}

#[tokio::test]
async fn sole_oversized_message_is_never_partial() {
    let message = Message::human("one\ntwo\nthree\nfour");
    let chars = Arc::new(FnTokenCounter::new(|messages: &[Message]| {
        messages.iter().map(|m| m.content().to_text().len()).sum()
    }));
    for strategy in [Strategy::First, Strategy::Last] {
        let options = TrimOptions::new(5, chars.clone())
            .strategy(strategy)
            .allow_partial(true);
        let trimmed = trim_messages(std::slice::from_ref(&message), &options)
            .await
            .unwrap();
        assert!(trimmed.is_empty(), "{strategy} produced {trimmed:?}");
    }
}

#[tokio::test]
async fn final_message_alone_excluded_gets_no_partial() {
    let messages = vec![
        Message::human("aaaa"),
        Message::ai("bbbb"),
        Message::human("cc\ndd"),
    ];
    let chars = Arc::new(FnTokenCounter::new(|messages: &[Message]| {
        messages.iter().map(|m| m.content().to_text().len()).sum()
    }));
    let options = TrimOptions::new(10, chars)
        .strategy(Strategy::First)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, messages[..2].to_vec());
}

#[tokio::test]
async fn output_never_exceeds_budget() {
    let messages = history();
    for max_tokens in 0..60 {
        for strategy in [Strategy::First, Strategy::Last] {
            for allow_partial in [false, true] {
                let options = TrimOptions::new(max_tokens, block_counter())
                    .strategy(strategy)
                    .allow_partial(allow_partial)
                    .include_system(strategy == Strategy::Last);
                let trimmed = trim_messages(&messages, &options).await.unwrap();
                assert!(
                    count(&trimmed).await <= max_tokens,
                    "{strategy} partial={allow_partial} max={max_tokens}"
                );
            }
        }
    }
}

#[tokio::test]
async fn first_keeps_a_prefix_and_last_keeps_a_suffix() {
    let messages = history();
    for max_tokens in [10, 20, 30, 44, 54] {
        let first = TrimOptions::new(max_tokens, block_counter()).strategy(Strategy::First);
        let kept = trim_messages(&messages, &first).await.unwrap();
        assert_eq!(kept, messages[..kept.len()].to_vec());

        let last = TrimOptions::new(max_tokens, block_counter());
        let kept = trim_messages(&messages, &last).await.unwrap();
        assert_eq!(kept, messages[messages.len() - kept.len()..].to_vec());
    }
}

#[tokio::test]
async fn pinned_system_survives_start_on() {
    let messages = history();
    let options = TrimOptions::new(20, block_counter())
        .include_system(true)
        .start_on([MessageKind::Human]);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, vec![messages[0].clone()]);
}

#[tokio::test]
async fn oversized_first_message_is_cut_when_others_follow() {
    let messages = vec![Message::human("one\ntwo\nthree"), Message::ai("x")];
    let chars = Arc::new(FnTokenCounter::new(|messages: &[Message]| {
        messages.iter().map(|m| m.content().to_text().len()).sum()
    }));
    let options = TrimOptions::new(8, chars)
        .strategy(Strategy::First)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, vec![Message::human("one\ntwo\n")]);
}

// --- Block fallback ---

/// Text costs its byte length, an image block costs 10.
fn mixed_counter() -> Arc<dyn TokenCounter> {
    Arc::new(FnTokenCounter::new(|messages: &[Message]| {
        messages
            .iter()
            .map(|m| match m.content() {
                Content::Text(text) => text.len(),
                Content::Blocks(blocks) => blocks
                    .iter()
                    .map(|block| block.as_text().map_or(10, str::len))
                    .sum(),
            })
            .sum()
    }))
}

fn image() -> ContentBlock {
    ContentBlock::ImageUrl(serde_json::json!({"url": "https://example.com/cat.png"}))
}

fn with_middle(middle: Vec<ContentBlock>) -> Vec<Message> {
    vec![Message::human("ab"), Message::ai(middle).with_id("mid"), Message::human("z")]
}

#[tokio::test]
async fn unfit_blocks_fall_back_to_text_prefix() {
    let messages = with_middle(vec![image(), ContentBlock::text("l1\nl2\nl3")]);
    let options = TrimOptions::new(8, mixed_counter())
        .strategy(Strategy::First)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();

    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed[0], messages[0]);
    assert_eq!(trimmed[1].id(), Some("mid"));
    assert_eq!(trimmed[1].content(), &Content::Text("l1\nl2\n".into()));
}

#[tokio::test]
async fn unfit_blocks_fall_back_to_text_suffix() {
    let messages = with_middle(vec![image(), ContentBlock::text("l1\nl2\nl3")]);
    let options = TrimOptions::new(4, mixed_counter()).allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();

    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed[0].id(), Some("mid"));
    assert_eq!(trimmed[0].content(), &Content::Text("l3".into()));
    assert_eq!(trimmed[1], messages[2]);
}

#[tokio::test]
async fn image_only_message_stays_excluded() {
    let messages = with_middle(vec![image()]);
    let options = TrimOptions::new(8, mixed_counter())
        .strategy(Strategy::First)
        .allow_partial(true);
    let trimmed = trim_messages(&messages, &options).await.unwrap();
    assert_eq!(trimmed, vec![messages[0].clone()]);
}
