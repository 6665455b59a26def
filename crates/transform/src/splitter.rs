//! Text splitting collaborators used for partial message inclusion.

use async_trait::async_trait;
use chatloom_core::Result;

/// Splits text into ordered segments. Joining the segments must give back
/// the original text, otherwise partially included messages lose content.
#[async_trait]
pub trait TextSplitter: Send + Sync {
    async fn split(&self, text: &str) -> Result<Vec<String>>;
}

/// Split on `\n`, keeping the newline on every segment but the last.
///
/// `"a\nb\n"` becomes `["a\n", "b\n", ""]`.
pub fn split_on_newlines(text: &str) -> Vec<String> {
    let mut segments: Vec<String> = text.split('\n').map(|s| format!("{s}\n")).collect();
    if let Some(last) = segments.last_mut() {
        last.pop();
    }
    segments
}

/// The default splitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewlineSplitter;

#[async_trait]
impl TextSplitter for NewlineSplitter {
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok(split_on_newlines(text))
    }
}

/// Adapts a plain synchronous closure.
pub struct FnSplitter<F> {
    split: F,
}

impl<F> FnSplitter<F>
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    pub fn new(split: F) -> Self {
        Self { split }
    }
}

#[async_trait]
impl<F> TextSplitter for FnSplitter<F>
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok((self.split)(text))
    }
}
