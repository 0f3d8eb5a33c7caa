use async_trait::async_trait;
use crate::Result;

#[async_trait]
pub trait SentimentModel: Send + Sync {
    fn name(&self) -> &str;

    /// Predict one raw label per text, in the same order as `texts`.
    async fn predict(&self, texts: &[String]) -> Result<Vec<i64>>;
}
