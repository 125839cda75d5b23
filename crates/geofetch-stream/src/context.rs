//! Shared per-session download state.
//!
//! One [`SharedDownloadContext`] is owned jointly (via `Arc`) by the
//! downloader worker and every iterator subscribed to it. Everything is
//! immutable after construction except the cancellation token, the
//! session-state and last-error cells, and the subscriber registry — each
//! individually synchronized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};

use tokio_util::sync::CancellationToken;

use geofetch_core::{
    DownloadConfig, DownloadError, DownloadEvent, FeatureCache, FeaturePageSource, FeatureRecord,
    FeatureSchema, NoopProgressSink, ProgressSink,
};

use crate::spill::SpillBuffer;

/// How a subscriber receives feature payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Records are pushed into the subscriber's spill buffer as they
    /// arrive.
    Payload,
    /// Only events are delivered; payload is re-read from the shared
    /// cache.
    CountOnly,
}

/// Lifecycle of the session's downloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadState {
    /// No downloader has started yet.
    NotStarted,
    /// The downloader is running.
    Running,
    /// Terminal: the downloader emitted end-of-download.
    Finished {
        /// Whether the download ran to natural completion.
        success: bool,
    },
}

impl DownloadState {
    /// Whether the session reached its terminal state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<DownloadEvent>,
    spill: Option<Arc<SpillBuffer>>,
}

/// One subscriber's view of the session: an event receiver plus, in
/// payload mode, the spill buffer the downloader fills for it.
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) mode: SubscriptionMode,
    pub(crate) events: mpsc::Receiver<DownloadEvent>,
    pub(crate) spill: Option<Arc<SpillBuffer>>,
}

impl Subscription {
    /// Identifier used to unsubscribe.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Delivery mode of this subscription.
    #[must_use]
    pub const fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Receiver for this subscriber's events.
    #[must_use]
    pub const fn events(&self) -> &mpsc::Receiver<DownloadEvent> {
        &self.events
    }
}

/// State shared by one downloader and its subscribed iterators.
pub struct SharedDownloadContext {
    source: Arc<dyn FeaturePageSource>,
    cache: Arc<dyn FeatureCache>,
    schema: FeatureSchema,
    config: DownloadConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    state: Mutex<DownloadState>,
    last_error: Mutex<Option<DownloadError>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
}

impl SharedDownloadContext {
    /// Create the context for one download session.
    #[must_use]
    pub fn new(
        source: Arc<dyn FeaturePageSource>,
        cache: Arc<dyn FeatureCache>,
        schema: FeatureSchema,
        config: DownloadConfig,
    ) -> Self {
        Self {
            source,
            cache,
            schema,
            config,
            progress: Arc::new(NoopProgressSink::new()),
            cancel: CancellationToken::new(),
            state: Mutex::new(DownloadState::NotStarted),
            last_error: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    /// Forward cumulative progress to `sink` in addition to the event
    /// stream.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// The network page source.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn FeaturePageSource> {
        &self.source
    }

    /// The shared feature cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn FeatureCache> {
        &self.cache
    }

    /// Schema of the feature type being downloaded.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// The progress sink.
    #[must_use]
    pub fn progress_sink(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    /// A clone of the session's cancellation token (the stop flag).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Set the stop flag. Callable from any thread; the in-flight page
    /// fetch observes it and unwinds.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the stop flag is set.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current downloader lifecycle state.
    #[must_use]
    pub fn download_state(&self) -> DownloadState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_download_state(&self, state: DownloadState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// The error that failed the session, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<DownloadError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_error(&self, error: DownloadError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Register a subscriber. Payload subscribers get a spill buffer the
    /// downloader fills; everyone gets the event stream.
    #[must_use]
    pub fn subscribe(&self, mode: SubscriptionMode) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (sender, events) = mpsc::channel();
        let spill = match mode {
            SubscriptionMode::Payload => {
                Some(Arc::new(SpillBuffer::new(self.config.spill_threshold_bytes)))
            }
            SubscriptionMode::CountOnly => None,
        };

        self.lock_subscribers().push(Subscriber {
            id,
            sender,
            spill: spill.clone(),
        });
        Subscription {
            id,
            mode,
            events,
            spill,
        }
    }

    /// Remove a subscriber and release its spill buffer.
    pub fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.lock_subscribers();
        if let Some(index) = subscribers.iter().position(|s| s.id == id) {
            let subscriber = subscribers.swap_remove(index);
            if let Some(spill) = &subscriber.spill {
                spill.close();
            }
        }
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Fan an event out to every subscriber. Send failures (a consumer
    /// that went away without unsubscribing) are ignored.
    pub(crate) fn publish(&self, event: &DownloadEvent) {
        for subscriber in self.lock_subscribers().iter() {
            let _ = subscriber.sender.send(event.clone());
        }
    }

    /// Append a batch to every payload subscriber's spill buffer.
    pub(crate) fn push_records(&self, records: &[FeatureRecord]) {
        for subscriber in self.lock_subscribers().iter() {
            let Some(spill) = &subscriber.spill else {
                continue;
            };
            for record in records {
                if let Err(e) = spill.push_record(record) {
                    tracing::debug!(
                        target: "geofetch.stream",
                        subscriber = subscriber.id,
                        error = %e,
                        "Dropping batch for closed subscriber"
                    );
                    break;
                }
            }
        }
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use geofetch_core::{DecodedPage, DownloadResult, FeaturePageSource, FieldDef, FieldType};

    use super::*;

    /// A page source that always reports an empty result set.
    pub(crate) struct NullSource;

    #[async_trait]
    impl FeaturePageSource for NullSource {
        async fn hits(&self) -> DownloadResult<Option<u64>> {
            Ok(None)
        }

        async fn fetch_page(
            &self,
            _start_index: u64,
            _max_features: u64,
        ) -> DownloadResult<DecodedPage> {
            Ok(DecodedPage::default())
        }
    }

    pub(crate) fn schema() -> FeatureSchema {
        FeatureSchema::new(
            "test:points",
            vec![
                FieldDef::new("name", FieldType::String),
                FieldDef::new("height", FieldType::Double),
            ],
        )
    }

    pub(crate) fn null_context(config: DownloadConfig) -> Arc<SharedDownloadContext> {
        Arc::new(SharedDownloadContext::new(
            Arc::new(NullSource),
            Arc::new(geofetch_core::MemoryFeatureCache::new()),
            schema(),
            config,
        ))
    }
}
