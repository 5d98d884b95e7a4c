//! Retrieval of log artifacts

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};

/// Default request timeout for log downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of log bodies
///
/// The whole body is returned at once; logs are bounded in size.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    /// Fetch the complete resource at `url`
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Fetch`] on connection failure, timeout or a
    /// non-success status.
    async fn fetch(&self, url: &str) -> HarvestResult<Bytes>;
}

/// HTTP(S) fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> HarvestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pulse-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LogFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> HarvestResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::fetch(url, format!("HTTP status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HarvestError::fetch(url, e))?;
        debug!(url, bytes = body.len(), "Fetched log");
        Ok(body)
    }
}
