//! Network page-source port.

use async_trait::async_trait;

use crate::download::DownloadResult;

use super::DecodedPage;

/// Port for fetching feature pages from a remote server.
///
/// Implementations own URL construction and the transport; the downloader
/// drives the paging loop through this trait and never sees the wire.
#[async_trait]
pub trait FeaturePageSource: Send + Sync {
    /// Ask the server for the total matched count only (a hits probe).
    ///
    /// `Ok(None)` means the server could not or would not answer; the
    /// session proceeds with an unknown total rather than failing.
    async fn hits(&self) -> DownloadResult<Option<u64>>;

    /// Fetch one page starting at `start_index`, requesting at most
    /// `max_features` records (`0` = no bound, the server decides).
    async fn fetch_page(
        &self,
        start_index: u64,
        max_features: u64,
    ) -> DownloadResult<DecodedPage>;

    /// Human-readable phrasing for a failure `reason`.
    ///
    /// Protocol implementations override this for format-specific wording;
    /// the downloader reports through it exactly once per failed session.
    fn error_message(&self, reason: &str) -> String {
        format!("Error while fetching features: {reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mockall::mock! {
        PageSource {}

        #[async_trait]
        impl FeaturePageSource for PageSource {
            async fn hits(&self) -> DownloadResult<Option<u64>>;
            async fn fetch_page(
                &self,
                start_index: u64,
                max_features: u64,
            ) -> DownloadResult<DecodedPage>;
        }
    }

    #[tokio::test]
    async fn mocked_source_round_trip() {
        let mut source = MockPageSource::new();
        source.expect_hits().returning(|| Ok(Some(42)));
        source
            .expect_fetch_page()
            .returning(|_, _| Ok(DecodedPage::default()));

        assert_eq!(source.hits().await.unwrap(), Some(42));
        assert!(source.fetch_page(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_error_hook_includes_reason() {
        let source = MockPageSource::new();
        let message = source.error_message("connection reset");
        assert!(message.contains("connection reset"));
    }
}
