use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default reference offset for publication times (IST, +05:30).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Builds the reference offset used to normalize publication times.
pub fn reference_offset(minutes: i32) -> crate::Result<FixedOffset> {
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| crate::Error::Config(format!("UTC offset out of range: {} minutes", minutes)))
}

/// A feed entry as delivered by the source, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub title: Option<String>,
    pub published: Option<String>,
    pub link: Option<String>,
    pub media: Vec<MediaObject>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    pub medium: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Sentiment {
    Negative = 0,
    Neutral = 1,
    Positive = 2,
}

impl Sentiment {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Sentiment {
    type Error = crate::Error;

    fn try_from(value: i64) -> crate::Result<Self> {
        match value {
            0 => Ok(Self::Negative),
            1 => Ok(Self::Neutral),
            2 => Ok(Self::Positive),
            other => Err(crate::Error::BatchInference(format!("unknown sentiment label {}", other))),
        }
    }
}

impl From<Sentiment> for i64 {
    fn from(value: Sentiment) -> Self {
        value.as_i64()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        };
        f.write_str(label)
    }
}

/// The pipeline's working unit: one validated, progressively enriched entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub publication_time: Option<DateTime<FixedOffset>>,
    pub link: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub image_encoded: Option<String>,
    pub sentiment: Option<Sentiment>,
}

impl CanonicalRecord {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            publication_time: None,
            link: link.into(),
            summary: String::new(),
            tags: Vec::new(),
            image_encoded: None,
            sentiment: None,
        }
    }
}

/// An article as read back from storage, joined with its image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub publication_timestamp: Option<DateTime<FixedOffset>>,
    pub article_link: String,
    pub summary: Option<String>,
    pub image_base64: Option<String>,
    pub sentiment: Option<i64>,
}

/// Inclusive publication time window for article queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub sentiment: Option<Sentiment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_labels() {
        assert_eq!(Sentiment::try_from(0).unwrap(), Sentiment::Negative);
        assert_eq!(Sentiment::try_from(2).unwrap(), Sentiment::Positive);
        assert!(Sentiment::try_from(3).is_err());
        assert!(Sentiment::try_from(-1).is_err());
        assert_eq!(Sentiment::Neutral.as_i64(), 1);
        assert_eq!(Sentiment::Positive.to_string(), "positive");
    }

    #[test]
    fn test_sentiment_serializes_as_integer() {
        let json = serde_json::to_string(&Sentiment::Positive).unwrap();
        assert_eq!(json, "2");
        let parsed: Sentiment = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Sentiment::Negative);
        assert!(serde_json::from_str::<Sentiment>("7").is_err());
    }

    #[test]
    fn test_reference_offset() {
        let ist = reference_offset(DEFAULT_UTC_OFFSET_MINUTES).unwrap();
        assert_eq!(ist.local_minus_utc(), 19_800);
        assert!(reference_offset(24 * 60).is_err());
    }
}
