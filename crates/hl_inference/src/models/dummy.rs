use std::fmt;
use hl_core::{Result, Sentiment, SentimentModel};

/// Offline stand-in for the model server. Labels every text neutral.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SentimentModel for DummyModel {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn predict(&self, texts: &[String]) -> Result<Vec<i64>> {
        Ok(vec![Sentiment::Neutral.as_i64(); texts.len()])
    }
}
