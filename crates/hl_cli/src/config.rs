use chrono::FixedOffset;
use clap::Args;
use hl_core::{reference_offset, Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// A duration such as `1h15m30s`, `30m` or `900`. Bare numbers are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds += num * unit;
                current_number.clear();
                has_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds += num;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

/// Process configuration. Every flag can also come from the environment
/// (or a `.env` file loaded before parsing).
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// RSS feed to ingest
    #[arg(long, env = "RSS_FEED_URL")]
    pub feed_url: Option<String>,

    /// Time between ingestion cycles (e.g. 15m, 900)
    #[arg(long, env = "POLL_INTERVAL", default_value = "900")]
    pub poll_interval: HumanDuration,

    /// How late a cycle may start before it is skipped
    #[arg(long, env = "GRACE_TOL", default_value = "60")]
    pub misfire_grace: HumanDuration,

    /// Sentiment model: invocations (HTTP model server) or dummy
    #[arg(long, env = "MODEL", default_value = "invocations")]
    pub model: String,

    #[arg(long, env = "MODEL_API", default_value = hl_inference::DEFAULT_MODEL_URL)]
    pub model_url: String,

    #[arg(long, env = "BATCH_SIZE", default_value_t = hl_inference::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, env = "INFERENCE_CONCURRENCY", default_value_t = 1)]
    pub inference_concurrency: usize,

    #[arg(long, env = "IMAGE_CONCURRENCY", default_value_t = 4)]
    pub image_concurrency: usize,

    /// Timeout applied to every outbound HTTP request
    #[arg(long, env = "HTTP_TIMEOUT", default_value = "30s")]
    pub http_timeout: HumanDuration,

    #[arg(long, env = "IMAGE_MAX_BYTES", default_value_t = hl_feed::DEFAULT_IMAGE_MAX_BYTES)]
    pub image_max_bytes: u64,

    /// Offset publication times are normalized to, in minutes east of UTC
    #[arg(long, env = "FEED_UTC_OFFSET_MINUTES", default_value_t = hl_core::DEFAULT_UTC_OFFSET_MINUTES, allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,

    /// Storage backend: postgres, sqlite or memory
    #[arg(long, env = "STORAGE", default_value = "sqlite")]
    pub storage: String,

    /// Full connection URL; overrides the POSTGRES_* and SQLITE_PATH settings
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "POSTGRES_HOST")]
    pub postgres_host: Option<String>,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DB")]
    pub postgres_db: Option<String>,

    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: Option<String>,

    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub postgres_password: Option<String>,

    #[arg(long, env = "SQLITE_PATH", default_value = "articles.db")]
    pub sqlite_path: String,

    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: SocketAddr,

    /// CSV file sentiment corrections are appended to
    #[arg(long, env = "FEEDBACK_PATH", default_value = "/data/feedback.csv")]
    pub feedback_path: PathBuf,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9000)
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Also write logs to this file
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.0.is_zero() {
            return Err(Error::Config("poll interval must be greater than zero".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be greater than zero".to_string()));
        }
        self.offset()?;
        self.storage_location()?;
        Ok(())
    }

    pub fn feed_url(&self) -> Result<&str> {
        self.feed_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Config("RSS_FEED_URL is not set".to_string()))
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        reference_offset(self.utc_offset_minutes)
    }

    pub fn inference_config(&self) -> hl_inference::Config {
        hl_inference::Config {
            model_name: Some(self.model.clone()),
            model_url: Some(self.model_url.clone()),
            timeout: self.http_timeout.0,
        }
    }

    /// Connection string for the selected backend, `None` for memory.
    pub fn storage_location(&self) -> Result<Option<String>> {
        match self.storage.as_str() {
            "memory" => Ok(None),
            "sqlite" => Ok(Some(self.database_url.clone().unwrap_or_else(|| self.sqlite_path.clone()))),
            "postgres" => match &self.database_url {
                Some(url) => Ok(Some(url.clone())),
                None => self.postgres_url().map(Some),
            },
            other => Err(Error::Config(format!(
                "Unsupported storage backend: {} (expected postgres, sqlite or memory)",
                other
            ))),
        }
    }

    fn postgres_url(&self) -> Result<String> {
        let missing = |name: &str| Error::Config(format!("{} is required for postgres storage", name));
        let host = self.postgres_host.as_deref().ok_or_else(|| missing("POSTGRES_HOST"))?;
        let db = self.postgres_db.as_deref().ok_or_else(|| missing("POSTGRES_DB"))?;
        let user = self.postgres_user.as_deref().ok_or_else(|| missing("POSTGRES_USER"))?;

        let mut url = Url::parse(&format!("postgres://{}:{}/{}", host, self.postgres_port, db))
            .map_err(|e| Error::Config(format!("Invalid postgres settings: {}", e)))?;
        url.set_username(user)
            .map_err(|_| Error::Config("Invalid POSTGRES_USER".to_string()))?;
        url.set_password(self.postgres_password.as_deref())
            .map_err(|_| Error::Config("Invalid POSTGRES_PASSWORD".to_string()))?;
        Ok(url.to_string())
    }
}
