use hl_core::metrics::record_ingest;
use hl_core::{ArticleStore, Result};
use hl_inference::SentimentBatcher;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use crate::parser::FeedParser;
use crate::source::FeedSource;

/// Counters for one ingestion cycle. Per-entry and per-batch failures only
/// show up here; they never fail the cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub rejected: usize,
    pub images: usize,
    pub labelled: usize,
    pub failed_batches: usize,
    pub inserted: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} rejected={} images={} labelled={} failed_batches={} inserted={}",
            self.fetched, self.rejected, self.images, self.labelled, self.failed_batches, self.inserted
        )
    }
}

/// Runs source -> parser -> sentiment batcher -> store for one cycle.
pub struct IngestManager {
    source: Arc<dyn FeedSource>,
    parser: FeedParser,
    batcher: SentimentBatcher,
    store: Arc<dyn ArticleStore>,
}

impl IngestManager {
    pub fn new(
        source: Arc<dyn FeedSource>,
        parser: FeedParser,
        batcher: SentimentBatcher,
        store: Arc<dyn ArticleStore>,
    ) -> Self {
        Self { source, parser, batcher, store }
    }

    /// Fails only when the source is unreachable or malformed, or when the
    /// store rejects the batch.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        info!("🚀 Starting ingestion cycle for {}", self.source.name());

        let entries = self.source.fetch_entries().await?;
        let mut report = CycleReport {
            fetched: entries.len(),
            ..CycleReport::default()
        };

        let (mut records, rejected) = self.parser.parse_valid(entries).await;
        report.rejected = rejected.len();
        report.images = records.iter().filter(|r| r.image_encoded.is_some()).count();

        if !records.is_empty() {
            let outcome = self.batcher.classify(&mut records).await;
            report.labelled = outcome.labelled;
            report.failed_batches = outcome.failed_batches;
        }

        report.inserted = self.store.persist(&records).await?;
        record_ingest(report.rejected, report.failed_batches, report.inserted);

        info!("✅ Cycle completed: {}", report);
        Ok(report)
    }
}
