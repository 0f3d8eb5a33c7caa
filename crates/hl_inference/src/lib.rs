use std::time::Duration;

pub mod batcher;
pub mod models;

pub use batcher::{BatchOutcome, SentimentBatcher, DEFAULT_BATCH_SIZE};
pub use hl_core::SentimentModel;

pub const DEFAULT_MODEL_URL: &str = "http://mlflow-model:5001/invocations";

#[derive(Debug, Clone)]
pub struct Config {
    /// `invocations` (HTTP model server) or `dummy`.
    pub model_name: Option<String>,
    pub model_url: Option<String>,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: None,
            model_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

pub mod prelude {
    pub use super::Config;
    pub use super::batcher::SentimentBatcher;
    pub use super::models::create_model;
    pub use hl_core::{CanonicalRecord, Result, Error, Sentiment};
}

pub use models::create_model;
