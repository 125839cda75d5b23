//! Count-only hits probe.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use geofetch_core::{DownloadResult, DownloadError};

use crate::config::WfsConfig;
use crate::http::HttpBackend;
use crate::url::build_get_feature_url;

/// Issues one `resultType=hits` request to learn the total matched count.
///
/// The probe completes exactly once per [`run`](Self::run): with an
/// authoritative count, or with `None` when the server failed to answer —
/// the download proceeds either way, sizing progress as unknown.
pub struct HitsProbe {
    backend: Arc<dyn HttpBackend>,
    config: WfsConfig,
}

#[derive(Deserialize)]
struct HitsBody {
    #[serde(rename = "numberMatched")]
    number_matched: Option<u64>,
}

impl HitsProbe {
    /// Create a probe for the configured endpoint.
    #[must_use]
    pub fn new(backend: Arc<dyn HttpBackend>, config: WfsConfig) -> Self {
        Self { backend, config }
    }

    /// Run the probe. `None` = unknown or failed.
    pub async fn run(&self) -> Option<u64> {
        let url = build_get_feature_url(&self.config, 0, 0, true);
        match self.fetch_count(&url).await {
            Ok(count) => {
                tracing::debug!(
                    target: "geofetch.wfs",
                    type_name = %self.config.type_name,
                    ?count,
                    "Hits probe complete"
                );
                count
            }
            Err(e) => {
                tracing::warn!(
                    target: "geofetch.wfs",
                    "{}",
                    self.error_message(&e.to_string())
                );
                None
            }
        }
    }

    async fn fetch_count(&self, url: &Url) -> DownloadResult<Option<u64>> {
        let body = self.backend.get_bytes(url).await?;
        let parsed: HitsBody = serde_json::from_slice(&body)
            .map_err(|e| DownloadError::protocol(format!("malformed hits response: {e}")))?;
        Ok(parsed.number_matched)
    }

    /// Probe-specific phrasing for a failure `reason`.
    fn error_message(&self, reason: &str) -> String {
        format!(
            "Download of feature count for type {} failed: {reason}",
            self.config.type_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeBackend;

    fn config() -> WfsConfig {
        WfsConfig::new(
            Url::parse("https://example.com/wfs").unwrap(),
            "test:roads",
        )
    }

    #[tokio::test]
    async fn probe_reads_number_matched() {
        let backend = FakeBackend::new().with_body("resultType=hits", r#"{"numberMatched": 250}"#);
        let probe = HitsProbe::new(Arc::new(backend), config());

        assert_eq!(probe.run().await, Some(250));
    }

    #[tokio::test]
    async fn transport_failure_yields_unknown() {
        let backend = FakeBackend::new().with_error(
            "resultType=hits",
            DownloadError::network("connection refused"),
        );
        let probe = HitsProbe::new(Arc::new(backend), config());

        assert_eq!(probe.run().await, None);
    }

    #[tokio::test]
    async fn malformed_body_yields_unknown() {
        let backend = FakeBackend::new().with_body("resultType=hits", "not json");
        let probe = HitsProbe::new(Arc::new(backend), config());

        assert_eq!(probe.run().await, None);
    }

    #[tokio::test]
    async fn missing_count_field_yields_unknown() {
        let backend = FakeBackend::new().with_body("resultType=hits", "{}");
        let probe = HitsProbe::new(Arc::new(backend), config());

        assert_eq!(probe.run().await, None);
    }
}
