//! Deferred transforms and pipelines.

use async_trait::async_trait;
use chatloom_core::{Message, Result};
use tracing::debug;

/// A configured pass over a message history.
#[async_trait]
pub trait MessageTransform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn transform(&self, messages: Vec<Message>) -> Result<Vec<Message>>;
}

/// Runs transforms in order, feeding each one the previous output.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn MessageTransform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn then(mut self, stage: impl MessageTransform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn MessageTransform>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn run(&self, messages: &[Message]) -> Result<Vec<Message>> {
        let mut current = messages.to_vec();
        for stage in &self.stages {
            let before = current.len();
            current = stage.transform(current).await?;
            debug!(stage = stage.name(), input = before, output = current.len(), "Pipeline stage complete");
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
