pub mod models;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use models::SentimentModel;
pub use storage::ArticleStore;
pub use types::{
    reference_offset, ArticleQuery, CanonicalRecord, MediaObject, RawEntry, Sentiment, StoredArticle,
    DEFAULT_UTC_OFFSET_MINUTES,
};
