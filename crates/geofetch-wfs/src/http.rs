//! HTTP backend abstraction.
//!
//! A trait-based backend allows dependency injection in tests; the
//! production implementation is a thin wrapper over `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use geofetch_core::{DownloadConfig, DownloadError, DownloadResult};

/// Trait for HTTP backends that can fetch raw bytes from a URL.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// GET `url` and return the response body.
    async fn get_bytes(&self, url: &Url) -> DownloadResult<Bytes>;
}

/// Production backend over `reqwest`.
///
/// No retry logic: a failed page must halt the download sequence rather
/// than re-emit partial batches, so transient-error recovery belongs to
/// the caller issuing a fresh query.
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a backend honouring the configured timeout and user agent.
    #[must_use]
    pub fn new(config: &DownloadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .expect("failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_bytes(&self, url: &Url) -> DownloadResult<Bytes> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| DownloadError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::network_with_status(
                format!("server returned {status} for {url}"),
                status.as_u16(),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(e.to_string()))
    }
}
