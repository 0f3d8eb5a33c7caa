use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hl_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub const DEFAULT_IMAGE_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Downloads an image and returns it base64 encoded. Any failure is `None`.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<String>;
}

pub struct HttpImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_IMAGE_MAX_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Streams the body into a temporary file. The `TempPath` removes it on
    /// every return path.
    async fn download(&self, url: &str) -> Result<String> {
        let fetch_error = |e: reqwest::Error| Error::ImageFetch(format!("{}: {}", url, e));

        let mut response = self.client
            .get(url)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(Error::ImageFetch(format!(
                    "{}: {} bytes exceeds limit of {}",
                    url, length, self.max_bytes
                )));
            }
        }

        let (file, path) = NamedTempFile::new()?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(Error::ImageFetch(format!(
                    "{}: body exceeds limit of {} bytes",
                    url, self.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let bytes = tokio::fs::read(&path).await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(STANDARD.encode(bytes))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        match self.download(url).await {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!("⚠️ Image download failed: {}", e);
                None
            }
        }
    }
}
