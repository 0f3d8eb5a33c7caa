//! Batched sentiment classification with per-batch failure isolation.

use std::sync::Arc;
use futures_util::stream::{self, StreamExt};
use hl_core::{CanonicalRecord, Error, Result, Sentiment, SentimentModel};
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batches: usize,
    pub failed_batches: usize,
    pub labelled: usize,
}

pub struct SentimentBatcher {
    model: Arc<dyn SentimentModel>,
    batch_size: usize,
    concurrency: usize,
}

impl SentimentBatcher {
    pub fn new(model: Arc<dyn SentimentModel>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be greater than zero".to_string()));
        }
        Ok(Self {
            model,
            batch_size,
            concurrency: 1,
        })
    }

    /// Number of batches allowed in flight at once. Results are still applied
    /// in batch order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Label every record whose batch succeeds. Records of a failed batch keep
    /// `sentiment = None`; other batches are unaffected.
    pub async fn classify(&self, records: &mut [CanonicalRecord]) -> BatchOutcome {
        let titles: Vec<String> = records.iter().map(|r| r.title.clone()).collect();
        info!("🤖 Classifying {} headlines in batches of {}", titles.len(), self.batch_size);

        let results: Vec<Result<Vec<Sentiment>>> = stream::iter(titles.chunks(self.batch_size))
            .map(|texts| self.classify_batch(texts))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (index, (batch, result)) in records.chunks_mut(self.batch_size).zip(results).enumerate() {
            outcome.batches += 1;
            match result {
                Ok(labels) => {
                    for (record, label) in batch.iter_mut().zip(labels) {
                        record.sentiment = Some(label);
                        outcome.labelled += 1;
                    }
                }
                Err(e) => {
                    warn!("⚠️ Failed batch {}: {}", index + 1, e);
                    outcome.failed_batches += 1;
                }
            }
        }

        info!(
            "✨ Labelled {} headlines ({} of {} batches failed)",
            outcome.labelled, outcome.failed_batches, outcome.batches
        );
        outcome
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        let predictions = self.model.predict(texts).await?;
        if predictions.len() != texts.len() {
            return Err(Error::BatchInference(format!(
                "expected {} predictions, got {}",
                texts.len(),
                predictions.len()
            )));
        }
        predictions.into_iter().map(Sentiment::try_from).collect()
    }
}
