//! Validation and normalization of raw feed entries into canonical records.

use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use hl_core::{CanonicalRecord, Error, RawEntry, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::image::ImageFetcher;

/// Format of `pubDate`, e.g. `Fri, 01 Mar 2024 09:15:00 +0530`.
pub const PUBLISHED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

pub const DEFAULT_IMAGE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Link,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingField(Field),
}

/// Why the entry at `index` of the input produced no record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entry {index}: {kind}")]
pub struct ParseError {
    pub index: usize,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing {}", field),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        match e.kind {
            ParseErrorKind::MissingField(field) => Error::MissingField(field.as_str()),
        }
    }
}

/// Parse a `pubDate` string and shift it to `offset`.
pub fn parse_published(raw: &str, offset: &FixedOffset) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), PUBLISHED_FORMAT)
        .map(|t| t.with_timezone(offset))
        .map_err(|e| Error::DateParse(format!("{:?}: {}", raw, e)))
}

fn required(value: Option<String>, field: Field, index: usize) -> std::result::Result<String, ParseError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ParseError {
            index,
            kind: ParseErrorKind::MissingField(field),
        }),
    }
}

pub struct FeedParser {
    images: Arc<dyn ImageFetcher>,
    offset: FixedOffset,
    concurrency: usize,
}

impl FeedParser {
    pub fn new(images: Arc<dyn ImageFetcher>, offset: FixedOffset) -> Self {
        Self {
            images,
            offset,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }

    /// Number of entries (and so image downloads) processed at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// One result per entry, in input order.
    pub async fn parse(&self, entries: Vec<RawEntry>) -> Vec<std::result::Result<CanonicalRecord, ParseError>> {
        stream::iter(entries.into_iter().enumerate())
            .map(|(index, entry)| self.parse_entry(index, entry))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Valid records in input order, plus the rejected entries.
    pub async fn parse_valid(&self, entries: Vec<RawEntry>) -> (Vec<CanonicalRecord>, Vec<ParseError>) {
        let total = entries.len();
        let mut records = Vec::with_capacity(total);
        let mut rejected = Vec::new();
        for result in self.parse(entries).await {
            match result {
                Ok(record) => records.push(record),
                Err(e) => rejected.push(e),
            }
        }
        info!("📰 Parsed {} of {} entries ({} rejected)", records.len(), total, rejected.len());
        (records, rejected)
    }

    async fn parse_entry(&self, index: usize, entry: RawEntry) -> std::result::Result<CanonicalRecord, ParseError> {
        let RawEntry { title, published, link, media, tags, summary } = entry;

        let title = required(title, Field::Title, index).map_err(|e| {
            warn!("⚠️ Skipping entry: {}", e);
            e
        })?;
        let link = required(link, Field::Link, index).map_err(|e| {
            warn!("⚠️ Skipping entry {:?}: {}", title, e);
            e
        })?;

        let mut record = CanonicalRecord::new(title, link);
        record.summary = summary.unwrap_or_default();
        record.tags = tags;

        record.publication_time = match published.as_deref().map(|raw| parse_published(raw, &self.offset)) {
            Some(Ok(time)) => Some(time),
            Some(Err(e)) => {
                warn!("⚠️ {} for {:?}", e, record.title);
                None
            }
            None => {
                debug!("No publication date for {:?}", record.title);
                None
            }
        };

        let image_url = media
            .iter()
            .find(|m| m.medium.as_deref() == Some("image"))
            .and_then(|m| m.url.as_deref());
        if let Some(url) = image_url {
            record.image_encoded = self.images.fetch(url).await;
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Timelike};
    use hl_core::MediaObject;
    use std::sync::Mutex;

    /// Encodes the URL itself, fails for anything containing "missing".
    #[derive(Default)]
    struct FakeImages {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageFetcher for FakeImages {
        async fn fetch(&self, url: &str) -> Option<String> {
            self.requested.lock().unwrap().push(url.to_string());
            if url.contains("missing") {
                None
            } else {
                Some(format!("b64:{}", url))
            }
        }
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn entry(title: &str, link: &str) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            ..RawEntry::default()
        }
    }

    fn image(medium: &str, url: &str) -> MediaObject {
        MediaObject {
            medium: Some(medium.to_string()),
            url: Some(url.to_string()),
        }
    }

    #[tokio::test]
    async fn test_valid_entry_is_trimmed() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let mut raw = entry("  Budget passed \n", " https://news.test/budget ");
        raw.summary = Some("  The house voted. ".to_string());
        raw.tags = vec!["Politics".to_string(), "Economy".to_string()];

        let results = parser.parse(vec![raw]).await;
        let record = results.into_iter().next().unwrap().unwrap();
        assert_eq!(record.title, "Budget passed");
        assert_eq!(record.link, "https://news.test/budget");
        assert_eq!(record.summary, "  The house voted. ");
        assert_eq!(record.tags, vec!["Politics", "Economy"]);
        assert_eq!(record.sentiment, None);
    }

    #[tokio::test]
    async fn test_missing_link_is_rejected() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let mut no_link = entry("Orphan", "");
        no_link.link = None;
        let entries = vec![entry("Kept", "https://news.test/kept"), no_link, entry("   ", "https://news.test/blank")];

        let results = parser.parse(entries).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(ParseError { index: 1, kind: ParseErrorKind::MissingField(Field::Link) })
        );
        assert_eq!(
            results[2],
            Err(ParseError { index: 2, kind: ParseErrorKind::MissingField(Field::Title) })
        );
    }

    #[tokio::test]
    async fn test_parse_valid_splits_results() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let entries = vec![entry("A", "https://news.test/a"), entry("B", " ")];

        let (records, rejected) = parser.parse_valid(entries).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "A");
        assert_eq!(rejected.len(), 1);
        assert!(matches!(Error::from(rejected[0].clone()), Error::MissingField("link")));
    }

    #[tokio::test]
    async fn test_publication_time_normalized_to_offset() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let mut raw = entry("Dated", "https://news.test/dated");
        raw.published = Some("Fri, 01 Mar 2024 03:45:00 +0000".to_string());

        let record = parser.parse(vec![raw]).await.remove(0).unwrap();
        let time = record.publication_time.unwrap();
        assert_eq!(time.offset().local_minus_utc(), 19_800);
        assert_eq!(time.hour(), 9);
        assert_eq!(time.minute(), 15);
        assert_eq!(time, ist().with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap());
    }

    #[tokio::test]
    async fn test_bad_date_keeps_entry() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let mut raw = entry("Undated", "https://news.test/undated");
        raw.published = Some("yesterday-ish".to_string());

        let record = parser.parse(vec![raw]).await.remove(0).unwrap();
        assert_eq!(record.publication_time, None);
    }

    #[tokio::test]
    async fn test_first_image_media_wins() {
        let images = Arc::new(FakeImages::default());
        let parser = FeedParser::new(images.clone(), ist());
        let mut raw = entry("Pictured", "https://news.test/pictured");
        raw.media = vec![
            image("video", "https://cdn.test/clip.mp4"),
            image("image", "https://cdn.test/first.jpg"),
            image("image", "https://cdn.test/second.jpg"),
        ];

        let record = parser.parse(vec![raw]).await.remove(0).unwrap();
        assert_eq!(record.image_encoded.as_deref(), Some("b64:https://cdn.test/first.jpg"));
        assert_eq!(*images.requested.lock().unwrap(), vec!["https://cdn.test/first.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_image_keeps_record() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist());
        let mut raw = entry("No picture", "https://news.test/nopic");
        raw.media = vec![image("image", "https://cdn.test/missing.jpg")];

        let record = parser.parse(vec![raw]).await.remove(0).unwrap();
        assert_eq!(record.image_encoded, None);
    }

    #[tokio::test]
    async fn test_rejected_entries_fetch_no_image() {
        let images = Arc::new(FakeImages::default());
        let parser = FeedParser::new(images.clone(), ist());
        let mut raw = entry("", "https://news.test/x");
        raw.media = vec![image("image", "https://cdn.test/x.jpg")];

        let results = parser.parse(vec![raw]).await;
        assert!(results[0].is_err());
        assert!(images.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_with_concurrency() {
        let parser = FeedParser::new(Arc::new(FakeImages::default()), ist()).with_concurrency(8);
        let entries: Vec<RawEntry> = (0..20)
            .map(|i| entry(&format!("story {}", i), &format!("https://news.test/{}", i)))
            .collect();

        let (records, _) = parser.parse_valid(entries).await;
        let titles: Vec<String> = records.into_iter().map(|r| r.title).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("story {}", i)).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_parse_published_format() {
        let time = parse_published("Tue, 05 Nov 2024 18:30:00 +0530", &ist()).unwrap();
        assert_eq!(time, ist().with_ymd_and_hms(2024, 11, 5, 18, 30, 0).unwrap());
        assert!(matches!(parse_published("2024-11-05T18:30:00Z", &ist()), Err(Error::DateParse(_))));
    }
}
