//! Feature-request boundary.

use std::sync::{Arc, Mutex, PoisonError};

use geofetch_core::{DownloadResult, FeatureQuery};

use crate::context::{DownloadState, SharedDownloadContext, SubscriptionMode};
use crate::iterator::FeatureIterator;
use crate::thread::ThreadedDownloader;

/// Hands out pull-based feature iterators over one download session.
///
/// The first query starts the downloader worker (blocking until its loop
/// is live) and receives features through in-process payload delivery.
/// Later queries against the same session subscribe count-only and
/// re-read payload from the shared cache, since live pushes they were
/// not registered for cannot be replayed. Each iterator keeps
/// independent cursors, so one consumer's pace never blocks another's.
pub struct FeatureSource {
    ctx: Arc<SharedDownloadContext>,
    worker: Mutex<Option<ThreadedDownloader>>,
}

impl FeatureSource {
    /// Create a source over `ctx`.
    #[must_use]
    pub const fn new(ctx: Arc<SharedDownloadContext>) -> Self {
        Self {
            ctx,
            worker: Mutex::new(None),
        }
    }

    /// The shared session context.
    #[must_use]
    pub const fn context(&self) -> &Arc<SharedDownloadContext> {
        &self.ctx
    }

    /// Pull-based iterator for `query`; starts the download worker on
    /// first use.
    ///
    /// The first query's limit becomes the session's feature cap;
    /// iterators additionally enforce their own query limit.
    pub fn features(&self, query: FeatureQuery) -> DownloadResult<FeatureIterator> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let subscription =
            if worker.is_none() && self.ctx.download_state() == DownloadState::NotStarted {
                // Subscribe before the worker starts so no batch is missed.
                let subscription = self.ctx.subscribe(SubscriptionMode::Payload);
                match ThreadedDownloader::spawn(Arc::clone(&self.ctx), true, query.limit) {
                    Ok(spawned) => {
                        *worker = Some(spawned);
                        subscription
                    }
                    Err(e) => {
                        self.ctx.unsubscribe(subscription.id());
                        return Err(e);
                    }
                }
            } else {
                self.ctx.subscribe(SubscriptionMode::CountOnly)
            };
        drop(worker);

        Ok(FeatureIterator::new(
            Arc::clone(&self.ctx),
            query,
            Some(subscription),
        ))
    }

    /// Synchronously stop the download worker; no events fire after this
    /// returns. A no-op when nothing is running.
    pub fn stop_download(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }
}

impl Drop for FeatureSource {
    fn drop(&mut self) {
        self.stop_download();
    }
}
