//! Metric names and the helpers that record them. Everything here is a no-op
//! until a recorder is installed (see `headline --metrics-addr`).

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Duration;

pub const API_REQUESTS_TOTAL: &str = "api_requests_total";
pub const API_REQUEST_LATENCY_SECONDS: &str = "api_request_latency_seconds";
pub const API_REQUEST_ERRORS_TOTAL: &str = "api_request_errors_total";
pub const INGEST_CYCLES_TOTAL: &str = "ingest_cycles_total";
pub const INGEST_FAILED_BATCHES_TOTAL: &str = "ingest_failed_batches_total";
pub const INGEST_REJECTED_ENTRIES_TOTAL: &str = "ingest_rejected_entries_total";
pub const INGEST_INSERTED_ARTICLES_TOTAL: &str = "ingest_inserted_articles_total";

/// Latency buckets, in seconds, for [`API_REQUEST_LATENCY_SECONDS`].
pub const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// How a scheduler firing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Failed,
    Misfired,
    Coalesced,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Misfired => "misfired",
            Self::Coalesced => "coalesced",
        }
    }
}

pub fn describe() {
    describe_counter!(API_REQUESTS_TOTAL, "Total API requests per endpoint");
    describe_histogram!(API_REQUEST_LATENCY_SECONDS, Unit::Seconds, "API request latency per endpoint");
    describe_counter!(API_REQUEST_ERRORS_TOTAL, "API responses with a 4xx or 5xx status");
    describe_counter!(INGEST_CYCLES_TOTAL, "Scheduler firings by outcome");
    describe_counter!(INGEST_FAILED_BATCHES_TOTAL, "Sentiment batches whose inference failed");
    describe_counter!(INGEST_REJECTED_ENTRIES_TOTAL, "Feed entries dropped during parsing");
    describe_counter!(INGEST_INSERTED_ARTICLES_TOTAL, "Articles newly stored");
}

pub fn record_request(endpoint: &str, status: u16, latency: Duration) {
    counter!(API_REQUESTS_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
    histogram!(API_REQUEST_LATENCY_SECONDS, "endpoint" => endpoint.to_string()).record(latency.as_secs_f64());
    if status >= 400 {
        counter!(API_REQUEST_ERRORS_TOTAL, "endpoint" => endpoint.to_string(), "status" => status.to_string())
            .increment(1);
    }
}

pub fn record_cycle(outcome: CycleOutcome) {
    counter!(INGEST_CYCLES_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_ingest(rejected: usize, failed_batches: usize, inserted: usize) {
    counter!(INGEST_REJECTED_ENTRIES_TOTAL).increment(rejected as u64);
    counter!(INGEST_FAILED_BATCHES_TOTAL).increment(failed_batches as u64);
    counter!(INGEST_INSERTED_ARTICLES_TOTAL).increment(inserted as u64);
}
