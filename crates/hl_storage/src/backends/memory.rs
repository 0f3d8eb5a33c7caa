use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hl_core::{ArticleQuery, ArticleStore, CanonicalRecord, Result, StoredArticle};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use crate::StorageBackend;

type DedupKey = (String, Option<DateTime<Utc>>);

#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: Vec<(i64, CanonicalRecord)>,
    images: HashMap<i64, String>,
    keys: HashSet<DedupKey>,
    next_id: i64,
}

impl MemoryStore {
    fn key(record: &CanonicalRecord) -> DedupKey {
        (record.title.clone(), record.publication_time.map(|t| t.with_timezone(&Utc)))
    }

    /// Inserts the records whose dedup key is new. Cannot fail part way.
    fn insert_all(&mut self, records: &[CanonicalRecord]) -> usize {
        let mut inserted = 0;
        for record in records {
            if !self.keys.insert(Self::key(record)) {
                continue;
            }
            self.next_id += 1;
            let id = self.next_id;
            if let Some(image) = &record.image_encoded {
                self.images.insert(id, image.clone());
            }
            self.articles.push((id, record.clone()));
            inserted += 1;
        }
        inserted
    }

    fn list(&self, query: &ArticleQuery) -> Vec<StoredArticle> {
        let mut found: Vec<StoredArticle> = self
            .articles
            .iter()
            .filter(|(_, r)| match r.publication_time {
                Some(t) => t >= query.start && t <= query.end,
                None => false,
            })
            .filter(|(_, r)| query.sentiment.map_or(true, |s| r.sentiment == Some(s)))
            .map(|(id, r)| StoredArticle {
                id: *id,
                title: r.title.clone(),
                publication_timestamp: r.publication_time,
                article_link: r.link.clone(),
                summary: Some(r.summary.clone()),
                image_base64: self.images.get(id).cloned(),
                sentiment: r.sentiment.map(|s| s.as_i64()),
            })
            .collect();
        found.sort_by(|a, b| b.publication_timestamp.cmp(&a.publication_timestamp));
        found
    }
}

/// Process-local store with the same dedup key as the SQL backends. A call to
/// `persist` applies all of its records under one write lock.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn article_count(&self) -> usize {
        self.store.read().await.articles.len()
    }

    pub async fn image_count(&self) -> usize {
        self.store.read().await.images.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_location: &str) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn persist(&self, records: &[CanonicalRecord]) -> Result<usize> {
        if records.is_empty() {
            warn!("Empty list, nothing to persist");
            return Ok(0);
        }
        let inserted = self.store.write().await.insert_all(records);
        info!("💾 Inserted {} articles successfully", inserted);
        Ok(inserted)
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        Ok(self.store.read().await.list(query))
    }

    async fn article_title(&self, id: i64) -> Result<Option<String>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|(i, _)| *i == id).map(|(_, r)| r.title.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use hl_core::Sentiment;

    fn at(hour: u32) -> chrono::DateTime<FixedOffset> {
        FixedOffset::east_opt(19_800).unwrap().with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn record(title: &str, hour: u32, image: Option<&str>) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(title, format!("https://news.test/{}", title));
        record.publication_time = Some(at(hour));
        record.image_encoded = image.map(str::to_string);
        record
    }

    #[tokio::test]
    async fn test_persist_twice_is_idempotent() {
        let storage = MemoryStorage::new();
        let records = vec![record("X", 9, Some("aW1n")), record("Y", 10, None)];

        assert_eq!(storage.persist(&records).await.unwrap(), 2);
        assert_eq!(storage.persist(&records).await.unwrap(), 0);
        assert_eq!(storage.article_count().await, 2);
        assert_eq!(storage.image_count().await, 1);
    }

    #[tokio::test]
    async fn test_persist_keeps_earlier_rows_and_images() {
        let storage = MemoryStorage::new();
        storage.persist(&[record("X", 9, Some("aW1n"))]).await.unwrap();
        let batch = vec![record("X", 9, Some("b3RoZXI=")), record("Y", 10, Some("eQ=="))];

        assert_eq!(storage.persist(&batch).await.unwrap(), 1);
        assert_eq!(storage.article_count().await, 2);
        assert_eq!(storage.image_count().await, 2);
        let query = ArticleQuery { start: at(0), end: at(23), sentiment: None };
        let listed = storage.list_articles(&query).await.unwrap();
        assert_eq!(listed[1].title, "X");
        assert_eq!(listed[1].image_base64.as_deref(), Some("aW1n"));
    }

    #[tokio::test]
    async fn test_same_instant_in_other_offset_is_duplicate() {
        let storage = MemoryStorage::new();
        let mut utc_copy = record("X", 9, None);
        utc_copy.publication_time = utc_copy.publication_time.map(|t| t.with_timezone(&FixedOffset::east_opt(0).unwrap()));

        assert_eq!(storage.persist(&[record("X", 9, None)]).await.unwrap(), 1);
        assert_eq!(storage.persist(&[utc_copy]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_window_and_sentiment() {
        let storage = MemoryStorage::new();
        let mut good = record("good", 8, Some("Z29vZA=="));
        good.sentiment = Some(Sentiment::Positive);
        let mut bad = record("bad", 12, None);
        bad.sentiment = Some(Sentiment::Negative);
        let undated = CanonicalRecord::new("undated", "https://news.test/undated");
        storage.persist(&[good, bad, undated]).await.unwrap();

        let query = ArticleQuery { start: at(0), end: at(23), sentiment: None };
        let all = storage.list_articles(&query).await.unwrap();
        assert_eq!(all.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(), vec!["bad", "good"]);

        let query = ArticleQuery { sentiment: Some(Sentiment::Positive), ..query };
        let positive = storage.list_articles(&query).await.unwrap();
        assert_eq!(positive.len(), 1);
        assert_eq!(positive[0].image_base64.as_deref(), Some("Z29vZA=="));
        assert_eq!(storage.article_title(positive[0].id).await.unwrap().as_deref(), Some("good"));
        assert_eq!(storage.article_title(999).await.unwrap(), None);
    }
}
