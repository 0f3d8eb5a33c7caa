use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use hl_core::{ArticleQuery, ArticleStore, CanonicalRecord, Error, Result, StoredArticle};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use crate::StorageBackend;

pub const DEFAULT_DB_PATH: &str = "articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        publication_timestamp TEXT,
        article_link TEXT NOT NULL,
        summary TEXT,
        sentiment INTEGER,
        tags TEXT,
        UNIQUE (title, publication_timestamp)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        article_id INTEGER PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
        image_base64 TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

// NOT EXISTS also catches rows with a NULL timestamp, which the UNIQUE
// constraint treats as distinct.
const INSERT_ARTICLE: &str = r#"
    INSERT INTO articles (title, publication_timestamp, article_link, summary, sentiment, tags)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6
    WHERE NOT EXISTS (
        SELECT 1 FROM articles WHERE title = ?1 AND publication_timestamp IS ?2
    )
    ON CONFLICT (title, publication_timestamp) DO NOTHING
    RETURNING id
"#;

const INSERT_IMAGE: &str = "INSERT INTO images (article_id, image_base64) VALUES (?, ?)";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Persistence(format!("{}: {}", context, e))
}

/// Timestamps are stored as UTC RFC 3339 text so that string order is time order.
fn encode_time(time: &DateTime<FixedOffset>) -> String {
    time.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn decode_time(raw: Option<String>) -> Result<Option<DateTime<FixedOffset>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map_err(|e| Error::Persistence(format!("Failed to parse stored date {}: {}", s, e)))
    })
    .transpose()
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at the configured path"
    }

    async fn connect(location: &str) -> Result<Self> {
        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .unwrap_or(location);
        Self::new_with_path(Path::new(path)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Persistence(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_records(tx: &mut Transaction<'_, Sqlite>, records: &[CanonicalRecord]) -> Result<usize> {
        let mut inserted = 0;
        for record in records {
            let tags = serde_json::to_string(&record.tags)?;
            let id: Option<i64> = sqlx::query_scalar(INSERT_ARTICLE)
                .bind(&record.title)
                .bind(record.publication_time.as_ref().map(encode_time))
                .bind(&record.link)
                .bind(&record.summary)
                .bind(record.sentiment.map(|s| s.as_i64()))
                .bind(tags)
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_error("Failed to insert article"))?;

            let Some(id) = id else {
                debug!("Skipping duplicate article: {}", record.title);
                continue;
            };
            inserted += 1;

            if let Some(image) = &record.image_encoded {
                sqlx::query(INSERT_IMAGE)
                    .bind(id)
                    .bind(image)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_error("Failed to insert image"))?;
            }
        }
        Ok(inserted)
    }

    fn row_to_article(row: SqliteRow) -> Result<StoredArticle> {
        let read = |e: sqlx::Error| Error::Persistence(format!("Failed to read article row: {}", e));
        Ok(StoredArticle {
            id: row.try_get("id").map_err(read)?,
            title: row.try_get("title").map_err(read)?,
            publication_timestamp: decode_time(row.try_get("publication_timestamp").map_err(read)?)?,
            article_link: row.try_get("article_link").map_err(read)?,
            summary: row.try_get("summary").map_err(read)?,
            image_base64: row.try_get("image_base64").map_err(read)?,
            sentiment: row.try_get("sentiment").map_err(read)?,
        })
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn persist(&self, records: &[CanonicalRecord]) -> Result<usize> {
        if records.is_empty() {
            warn!("Empty list, nothing to persist");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(db_error("Failed to open transaction"))?;
        match Self::insert_records(&mut tx, records).await {
            Ok(inserted) => {
                tx.commit().await.map_err(db_error("Failed to commit"))?;
                info!("💾 Inserted {} articles successfully", inserted);
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback);
                }
                error!("Error inserting data, rolled back {} records: {}", records.len(), e);
                Err(match e {
                    Error::Persistence(_) => e,
                    other => Error::Persistence(other.to_string()),
                })
            }
        }
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.title, a.publication_timestamp, a.article_link,
                   a.summary, i.image_base64, a.sentiment
            FROM articles a
            LEFT JOIN images i ON a.id = i.article_id
            WHERE a.publication_timestamp BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR a.sentiment = ?3)
            ORDER BY a.publication_timestamp DESC
            "#,
        )
        .bind(encode_time(&query.start))
        .bind(encode_time(&query.end))
        .bind(query.sentiment.map(|s| s.as_i64()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list articles"))?;

        rows.into_iter().map(Self::row_to_article).collect()
    }

    async fn article_title(&self, id: i64) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT title FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to look up article"))
    }
}
