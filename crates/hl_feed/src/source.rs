use async_trait::async_trait;
use hl_core::{Error, RawEntry, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;
use url::Url;
use crate::rss::parse_rss;

/// Where a cycle's raw entries come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the current entries. Transport failures are `SourceUnreachable`,
    /// an unparseable document is `FeedFormat`.
    async fn fetch_entries(&self) -> Result<Vec<RawEntry>>;
}

pub struct HttpFeedSource {
    client: Client,
    url: Url,
}

impl HttpFeedSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("Invalid feed URL {}: {}", url, e)))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    fn name(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_entries(&self) -> Result<Vec<RawEntry>> {
        let unreachable = |e: reqwest::Error| Error::SourceUnreachable(format!("{}: {}", self.url, e));

        let body = self.client
            .get(self.url.clone())
            .send()
            .await
            .map_err(unreachable)?
            .error_for_status()
            .map_err(unreachable)?
            .text()
            .await
            .map_err(unreachable)?;

        let entries = parse_rss(&body)?;
        info!("📡 Fetched {} entries from {}", entries.len(), self.url);
        Ok(entries)
    }
}
