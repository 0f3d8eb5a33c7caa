use async_trait::async_trait;
use hl_core::{ArticleStore, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod backends;

pub use backends::*;

pub const CONNECT_ATTEMPTS: u32 = 3;
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait StorageBackend: ArticleStore + Sized + 'static {
    fn get_error_message() -> &'static str;

    /// Connect and run schema migrations.
    async fn connect(location: &str) -> Result<Self>;
}

/// Connect a backend, retrying while the database is still coming up.
pub async fn connect_with_retry<T: StorageBackend>(
    location: &str,
    max_attempts: u32,
    delay: Duration,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match T::connect(location).await {
            Ok(storage) => return Ok(storage),
            Err(e) if attempt < max_attempts => {
                info!("Storage initialization failed ({}), retrying {}/{}...", e, attempt, max_attempts);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "{} ({} attempts, last error: {})",
                    T::get_error_message(),
                    attempt,
                    e
                )))
            }
        }
    }
}

/// Build the store selected by name: `memory`, `sqlite` or `postgres`.
pub async fn create_storage(kind: &str, location: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    let storage: Arc<dyn ArticleStore> = match kind {
        "memory" => Arc::new(MemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let location = location.unwrap_or(sqlite::DEFAULT_DB_PATH);
            Arc::new(connect_with_retry::<SQLiteStorage>(location, CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY).await?)
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let location = location
                .ok_or_else(|| Error::Config("postgres storage needs a connection URL".to_string()))?;
            Arc::new(connect_with_retry::<PostgresStorage>(location, CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY).await?)
        }
        other => {
            return Err(Error::Config(format!(
                "Unsupported storage backend: {} (available: {})",
                other,
                available_backends().join(", ")
            )))
        }
    };
    info!("🏦 Storage backend initialized successfully (using {})", kind);
    Ok(storage)
}

pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["memory"];
    if cfg!(feature = "sqlite") {
        backends.push("sqlite");
    }
    if cfg!(feature = "postgres") {
        backends.push("postgres");
    }
    backends
}

pub mod prelude {
    pub use super::StorageBackend;
    pub use super::backends::*;
}
