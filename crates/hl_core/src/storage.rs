use async_trait::async_trait;
use crate::types::{ArticleQuery, CanonicalRecord, StoredArticle};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert every record whose (title, publication time) key is new, plus its
    /// image, inside one transaction. Returns the number of new articles.
    async fn persist(&self, records: &[CanonicalRecord]) -> Result<usize>;

    /// Articles published inside the query window, newest first.
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>>;

    async fn article_title(&self, id: i64) -> Result<Option<String>>;
}
