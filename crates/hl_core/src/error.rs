use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Image fetch error: {0}")]
    ImageFetch(String),

    #[error("Batch inference error: {0}")]
    BatchInference(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Feed source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Malformed feed: {0}")]
    FeedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Errors that abort a whole ingestion cycle. Everything else is absorbed
    /// by the component that produced it.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Error::Persistence(_) | Error::SourceUnreachable(_) | Error::FeedFormat(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
