//! Paged download orchestration.

use std::sync::Arc;

use geofetch_core::{DownloadError, DownloadEvent, DownloadResult};

use crate::context::{DownloadState, SharedDownloadContext};

/// Orchestrates the hits probe and the page loop for one session.
///
/// A `Downloader` serves exactly one session and is not reused across
/// queries. Events flow to subscribers through the shared context; the
/// terminal end-of-download event is emitted exactly once, on every exit
/// path, so consumers are never left waiting.
pub struct Downloader {
    ctx: Arc<SharedDownloadContext>,
}

/// Mutable state of one `run()` invocation.
struct DownloadSession {
    total: u64,
    pages: u64,
    hits: Option<u64>,
}

impl Downloader {
    /// Create a downloader over `ctx`.
    #[must_use]
    pub const fn new(ctx: Arc<SharedDownloadContext>) -> Self {
        Self { ctx }
    }

    /// The shared context this downloader publishes to.
    #[must_use]
    pub const fn context(&self) -> &Arc<SharedDownloadContext> {
        &self.ctx
    }

    /// Run the fetch sequence to completion and return the cumulative
    /// delivered count.
    ///
    /// `serialize_features` controls payload emission: when false only
    /// count and progress events are published, for consumers that track
    /// progress without the payload. `max_features` caps the cumulative
    /// delivered count (`0` = no client cap) and is honoured even when
    /// the server would return more.
    pub async fn run(&self, serialize_features: bool, max_features: u64) -> DownloadResult<u64> {
        self.ctx.set_download_state(DownloadState::Running);
        let result = self.run_session(serialize_features, max_features).await;

        let success = result.is_ok();
        match &result {
            Ok(total) => {
                tracing::debug!(target: "geofetch.download", total, "Download complete");
            }
            Err(e) if e.is_interrupted() => {
                tracing::debug!(target: "geofetch.download", "Download stopped before completion");
            }
            Err(e) => {
                // Report once through the protocol hook; partial results
                // already emitted remain valid.
                let reason = self.ctx.source().error_message(&e.to_string());
                tracing::error!(target: "geofetch.download", "{reason}");
                self.ctx.record_error(e.clone());
            }
        }

        self.ctx
            .set_download_state(DownloadState::Finished { success });
        self.ctx.publish(&DownloadEvent::end_of_download(success));
        result
    }

    async fn run_session(
        &self,
        serialize_features: bool,
        max_features: u64,
    ) -> DownloadResult<u64> {
        let cancel = self.ctx.cancellation_token();
        let config = self.ctx.config().clone();
        let mut session = DownloadSession {
            total: 0,
            pages: 0,
            hits: None,
        };

        // Probe the total first when paging without a client bound, to
        // size progress and the number of pages to expect.
        if config.paging_enabled && max_features == 0 {
            let hits = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::Interrupted),
                hits = self.ctx.source().hits() => hits,
            };
            session.hits = match hits {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(
                        target: "geofetch.download",
                        "{}",
                        self.ctx.source().error_message(&e.to_string())
                    );
                    None
                }
            };
        }

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Interrupted);
            }

            let request_count = if config.paging_enabled {
                let remaining = if max_features > 0 {
                    max_features - session.total
                } else {
                    u64::MAX
                };
                config.page_size.min(remaining)
            } else {
                max_features
            };

            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::Interrupted),
                page = self.ctx.source().fetch_page(session.total, request_count) => page?,
            };
            session.pages += 1;
            if session.hits.is_none() {
                session.hits = page.number_matched;
            }

            let mut records = page.records;
            // The client cap binds even when the server over-delivers.
            if max_features > 0 {
                let remaining = usize::try_from(max_features - session.total).unwrap_or(usize::MAX);
                if records.len() > remaining {
                    records.truncate(remaining);
                }
            }
            let received = records.len() as u64;
            session.total += received;

            if received > 0 {
                if serialize_features {
                    self.ctx.cache().append(&records);
                    self.ctx.push_records(&records);
                }
                self.ctx.publish(&DownloadEvent::features_received(received));
            }
            self.ctx
                .publish(&DownloadEvent::progress(session.total, session.hits));
            self.ctx
                .progress_sink()
                .on_progress(session.total, session.hits);
            tracing::debug!(
                target: "geofetch.download",
                page = session.pages,
                received,
                total = session.total,
                "Page complete"
            );

            if !config.paging_enabled {
                break;
            }
            if max_features > 0 && session.total >= max_features {
                break;
            }
            if received < request_count {
                break;
            }
            if let Some(hits) = session.hits {
                if session.total >= hits {
                    break;
                }
            }
        }

        Ok(session.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SubscriptionMode;
    use async_trait::async_trait;
    use geofetch_core::{
        DecodedPage, DownloadConfig, Feature, FeaturePageSource, FeatureRecord, MemoryFeatureCache,
    };

    struct CountingSource {
        total: u64,
    }

    #[async_trait]
    impl FeaturePageSource for CountingSource {
        async fn hits(&self) -> DownloadResult<Option<u64>> {
            Ok(Some(self.total))
        }

        async fn fetch_page(
            &self,
            start_index: u64,
            max_features: u64,
        ) -> DownloadResult<DecodedPage> {
            let remaining = self.total.saturating_sub(start_index);
            let count = if max_features == 0 {
                remaining
            } else {
                remaining.min(max_features)
            };
            let records = (start_index..start_index + count)
                .map(|i| FeatureRecord::new(Feature::default(), format!("f.{i}")))
                .collect();
            Ok(DecodedPage::new(records, Some(self.total)))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl FeaturePageSource for FailingSource {
        async fn hits(&self) -> DownloadResult<Option<u64>> {
            Ok(None)
        }

        async fn fetch_page(
            &self,
            _start_index: u64,
            _max_features: u64,
        ) -> DownloadResult<DecodedPage> {
            Err(DownloadError::network("connection reset"))
        }
    }

    fn context(source: Arc<dyn FeaturePageSource>, page_size: u64) -> Arc<SharedDownloadContext> {
        Arc::new(SharedDownloadContext::new(
            source,
            Arc::new(MemoryFeatureCache::new()),
            crate::context::testing::schema(),
            DownloadConfig::default().with_page_size(page_size),
        ))
    }

    #[test]
    fn client_cap_limits_delivery() {
        let ctx = context(Arc::new(CountingSource { total: 250 }), 100);
        let downloader = Downloader::new(Arc::clone(&ctx));

        let total = tokio_test::block_on(downloader.run(true, 50)).unwrap();

        assert_eq!(total, 50);
        assert!(matches!(
            ctx.download_state(),
            DownloadState::Finished { success: true }
        ));
    }

    #[test]
    fn failure_records_error_and_finishes_unsuccessfully() {
        let ctx = context(Arc::new(FailingSource), 100);
        let subscription = ctx.subscribe(SubscriptionMode::CountOnly);
        let downloader = Downloader::new(Arc::clone(&ctx));

        let result = tokio_test::block_on(downloader.run(true, 0));

        assert!(result.is_err());
        assert!(matches!(
            ctx.download_state(),
            DownloadState::Finished { success: false }
        ));
        assert!(ctx.last_error().is_some());

        let events: Vec<_> = subscription.events().try_iter().collect();
        assert_eq!(events, vec![DownloadEvent::end_of_download(false)]);
    }

    #[test]
    fn stop_before_run_short_circuits() {
        let ctx = context(Arc::new(CountingSource { total: 250 }), 100);
        ctx.request_stop();
        let downloader = Downloader::new(Arc::clone(&ctx));

        let result = tokio_test::block_on(downloader.run(true, 0));

        assert!(matches!(result, Err(DownloadError::Interrupted)));
        assert!(matches!(
            ctx.download_state(),
            DownloadState::Finished { success: false }
        ));
    }
}
