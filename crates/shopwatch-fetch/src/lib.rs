//! # ShopWatch Fetch
//! HTTP content fetcher — turns a listing URL into a [`Snapshot`].
//!
//! Every request is bounded by the configured timeout; a hung shop server
//! costs one monitor one backoff interval, nothing more.

pub mod extract;

use std::time::Duration;

use async_trait::async_trait;

use shopwatch_core::error::{Result, ShopWatchError};
use shopwatch_core::traits::ContentFetcher;
use shopwatch_core::types::Snapshot;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

/// Fetches listing pages over HTTP and extracts snapshots.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ShopWatchError::Fetch(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Snapshot> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ShopWatchError::Fetch(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShopWatchError::Fetch(format!("HTTP {status} from {url}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ShopWatchError::Fetch(format!("Read body: {e}")))?;

        let snapshot = extract::snapshot_from_html(&body);
        tracing::debug!(
            url,
            name = snapshot.name.as_deref().unwrap_or("?"),
            sizes = snapshot.sizes.len(),
            "snapshot fetched"
        );
        Ok(snapshot)
    }
}
