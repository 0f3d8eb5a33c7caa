use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use hl_core::{ArticleQuery, ArticleStore, CanonicalRecord, Error, Result, StoredArticle};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        publication_timestamp TIMESTAMPTZ,
        article_link TEXT NOT NULL,
        summary TEXT,
        sentiment INTEGER,
        tags JSONB,
        UNIQUE (title, publication_timestamp)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        article_id INTEGER PRIMARY KEY REFERENCES articles(id) ON DELETE CASCADE,
        image_base64 TEXT NOT NULL
    )
    "#,
];

const INSERT_ARTICLE: &str = r#"
    INSERT INTO articles (title, publication_timestamp, article_link, summary, sentiment, tags)
    SELECT $1::text, $2::timestamptz, $3::text, $4::text, $5::integer, $6::jsonb
    WHERE NOT EXISTS (
        SELECT 1 FROM articles
        WHERE title = $1::text AND publication_timestamp IS NOT DISTINCT FROM $2::timestamptz
    )
    ON CONFLICT (title, publication_timestamp) DO NOTHING
    RETURNING id
"#;

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Persistence(format!("{}: {}", context, e))
}

pub struct PostgresStorage {
    pool: PgPool,
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    fn get_error_message() -> &'static str {
        "PostgreSQL should be reachable at the configured POSTGRES_HOST/POSTGRES_PORT"
    }

    async fn connect(location: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(location)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        Self::from_pool(pool).await
    }
}

impl PostgresStorage {
    /// Wraps an existing pool, running the migrations first.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Persistence(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_records(tx: &mut Transaction<'_, Postgres>, records: &[CanonicalRecord]) -> Result<usize> {
        let mut inserted = 0;
        for record in records {
            let id: Option<i32> = sqlx::query_scalar(INSERT_ARTICLE)
                .bind(&record.title)
                .bind(record.publication_time)
                .bind(&record.link)
                .bind(&record.summary)
                .bind(record.sentiment.map(|s| s.as_i64() as i32))
                .bind(Json(&record.tags))
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_error("Failed to insert article"))?;

            let Some(id) = id else {
                debug!("Skipping duplicate article: {}", record.title);
                continue;
            };
            inserted += 1;

            if let Some(image) = &record.image_encoded {
                sqlx::query("INSERT INTO images (article_id, image_base64) VALUES ($1, $2)")
                    .bind(id)
                    .bind(image)
                    .execute(&mut **tx)
                    .await
                    .map_err(db_error("Failed to insert image"))?;
            }
        }
        Ok(inserted)
    }

    fn row_to_article(row: PgRow) -> Result<StoredArticle> {
        let read = |e: sqlx::Error| Error::Persistence(format!("Failed to read article row: {}", e));
        let published: Option<DateTime<Utc>> = row.try_get("publication_timestamp").map_err(read)?;
        Ok(StoredArticle {
            id: row.try_get("id").map_err(read)?,
            title: row.try_get("title").map_err(read)?,
            publication_timestamp: published.map(DateTime::<FixedOffset>::from),
            article_link: row.try_get("article_link").map_err(read)?,
            summary: row.try_get("summary").map_err(read)?,
            image_base64: row.try_get("image_base64").map_err(read)?,
            sentiment: row.try_get("sentiment").map_err(read)?,
        })
    }
}

#[async_trait]
impl ArticleStore for PostgresStorage {
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
                Err(e)
            }
        }
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id::bigint AS id, a.title, a.publication_timestamp, a.article_link,
                   a.summary, i.image_base64, a.sentiment::bigint AS sentiment
            FROM articles a
            LEFT JOIN images i ON a.id = i.article_id
            WHERE a.publication_timestamp BETWEEN $1 AND $2
              AND ($3::bigint IS NULL OR a.sentiment = $3::bigint)
            ORDER BY a.publication_timestamp DESC
            "#,
        )
        .bind(query.start)
        .bind(query.end)
        .bind(query.sentiment.map(|s| s.as_i64()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list articles"))?;

        rows.into_iter().map(Self::row_to_article).collect()
    }

    async fn article_title(&self, id: i64) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT title FROM articles WHERE id = $1::bigint")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to look up article"))
    }
}
