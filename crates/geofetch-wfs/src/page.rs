//! WFS page source.
//!
//! Implements the [`FeaturePageSource`] port over an HTTP backend and a
//! response decoder: one GetFeature request per page, decoded into
//! schema-aligned records.

use std::sync::Arc;

use async_trait::async_trait;

use geofetch_core::{
    DecodedPage, DownloadConfig, DownloadResult, FeatureDecoder, FeaturePageSource, FeatureSchema,
};

use crate::config::WfsConfig;
use crate::decode::JsonFeatureDecoder;
use crate::hits::HitsProbe;
use crate::http::{HttpBackend, ReqwestBackend};
use crate::url::build_get_feature_url;

/// Page source for one WFS feature-type endpoint.
pub struct WfsPageSource {
    backend: Arc<dyn HttpBackend>,
    decoder: Arc<dyn FeatureDecoder>,
    config: WfsConfig,
}

impl WfsPageSource {
    /// Create a page source from explicit backend and decoder.
    #[must_use]
    pub fn new(
        backend: Arc<dyn HttpBackend>,
        decoder: Arc<dyn FeatureDecoder>,
        config: WfsConfig,
    ) -> Self {
        Self {
            backend,
            decoder,
            config,
        }
    }

    /// Create a page source with the production backend and JSON decoder.
    #[must_use]
    pub fn with_defaults(
        config: WfsConfig,
        download_config: &DownloadConfig,
        schema: FeatureSchema,
    ) -> Self {
        let decoder =
            JsonFeatureDecoder::new(schema).with_ns_prefix_stripping(config.remove_ns_prefix);
        Self::new(
            Arc::new(ReqwestBackend::new(download_config)),
            Arc::new(decoder),
            config,
        )
    }
}

#[async_trait]
impl FeaturePageSource for WfsPageSource {
    async fn hits(&self) -> DownloadResult<Option<u64>> {
        let probe = HitsProbe::new(Arc::clone(&self.backend), self.config.clone());
        Ok(probe.run().await)
    }

    async fn fetch_page(
        &self,
        start_index: u64,
        max_features: u64,
    ) -> DownloadResult<DecodedPage> {
        let url = build_get_feature_url(&self.config, start_index, max_features, false);
        tracing::debug!(
            target: "geofetch.wfs",
            type_name = %self.config.type_name,
            start_index,
            max_features,
            "Issuing GetFeature page request"
        );

        let body = self.backend.get_bytes(&url).await?;
        self.decoder.decode(&body)
    }

    fn error_message(&self, reason: &str) -> String {
        format!(
            "Error while getting features of type {}: {reason}",
            self.config.type_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeBackend;
    use geofetch_core::{DownloadError, FieldDef, FieldType};
    use url::Url;

    fn source(backend: FakeBackend) -> WfsPageSource {
        let schema = FeatureSchema::new(
            "test:roads",
            vec![FieldDef::new("name", FieldType::String)],
        );
        let config = WfsConfig::new(
            Url::parse("https://example.com/wfs").unwrap(),
            "test:roads",
        );
        WfsPageSource::new(
            Arc::new(backend),
            Arc::new(JsonFeatureDecoder::new(schema)),
            config,
        )
    }

    #[tokio::test]
    async fn fetch_page_decodes_records() {
        let backend = FakeBackend::new().with_body(
            "startIndex=0",
            r#"{"numberMatched": 1, "features": [{"id": "roads.1", "properties": {"name": "A1"}}]}"#,
        );

        let page = source(backend).fetch_page(0, 100).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.records[0].id, "roads.1");
        assert_eq!(page.number_matched, Some(1));
    }

    #[tokio::test]
    async fn hits_failure_is_not_an_error() {
        let backend = FakeBackend::new()
            .with_error("resultType=hits", DownloadError::network("timed out"));

        assert_eq!(source(backend).hits().await.unwrap(), None);
    }

    #[tokio::test]
    async fn transport_errors_propagate_from_fetch_page() {
        let backend = FakeBackend::new().with_error(
            "startIndex=0",
            DownloadError::network_with_status("bad gateway", 502),
        );

        let err = source(backend).fetch_page(0, 100).await.unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Network {
                status_code: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn error_hook_names_the_feature_type() {
        let message = source(FakeBackend::new()).error_message("boom");
        assert!(message.contains("test:roads"));
        assert!(message.contains("boom"));
    }
}
