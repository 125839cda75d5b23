//! Dedicated downloader worker thread.
//!
//! Confines one [`Downloader`] run to a named OS thread with its own
//! current-thread runtime, behind a handle whose `spawn` and `stop` are
//! both synchronous: `spawn` blocks until the worker loop is live, and
//! `stop` blocks until the worker has fully exited, so no events fire
//! after it returns.

use std::sync::mpsc;
use std::thread;

use std::sync::Arc;

use geofetch_core::{DownloadError, DownloadResult};

use crate::context::SharedDownloadContext;
use crate::downloader::Downloader;

/// Handle to a downloader running on its own worker thread.
///
/// Owns exactly one [`Downloader`]; the pair is not reused across
/// sessions. Dropping the handle performs a best-effort synchronous stop.
pub struct ThreadedDownloader {
    ctx: Arc<SharedDownloadContext>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ThreadedDownloader {
    /// Spawn the worker and block until its loop is running.
    ///
    /// Readiness is a rendezvous: the worker signals after its runtime is
    /// built and the download loop is entered, and only then does this
    /// return. Runtime construction failures are propagated back to the
    /// caller.
    pub fn spawn(
        ctx: Arc<SharedDownloadContext>,
        serialize_features: bool,
        max_features: u64,
    ) -> DownloadResult<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<DownloadResult<()>>();
        let worker_ctx = Arc::clone(&ctx);

        let thread = thread::Builder::new()
            .name("geofetch-downloader".into())
            .spawn(move || {
                Self::run(&worker_ctx, serialize_features, max_features, &ready_tx);
            })
            .map_err(|e| {
                DownloadError::other(format!("failed to spawn downloader thread: {e}"))
            })?;

        ready_rx
            .recv()
            .map_err(|_| DownloadError::other("downloader thread died during startup"))??;

        Ok(Self {
            ctx,
            thread: Some(thread),
        })
    }

    /// Request cancellation and block until the worker has fully exited.
    ///
    /// Deadlock-free: the stop flag is signalled first, without holding
    /// any lock the worker needs, then the thread is joined. No events
    /// fire after this returns. Idempotent.
    pub fn stop(&mut self) {
        self.ctx.request_stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Whether the worker thread is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// The shared context the worker publishes to.
    #[must_use]
    pub const fn context(&self) -> &Arc<SharedDownloadContext> {
        &self.ctx
    }

    /// Worker body: build a current-thread runtime, signal readiness from
    /// inside it, then drive the download to its terminal event.
    fn run(
        ctx: &Arc<SharedDownloadContext>,
        serialize_features: bool,
        max_features: u64,
        ready_tx: &mpsc::Sender<DownloadResult<()>>,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = ready_tx.send(Err(DownloadError::other(format!(
                    "failed to build downloader runtime: {e}"
                ))));
                return;
            }
        };

        let downloader = Downloader::new(Arc::clone(ctx));
        runtime.block_on(async {
            // Mark the session live before the rendezvous so the caller
            // never observes NotStarted after spawn() returns.
            ctx.set_download_state(crate::context::DownloadState::Running);
            if ready_tx.send(Ok(())).is_err() {
                // Caller gave up waiting; nothing to run for.
                return;
            }
            match downloader.run(serialize_features, max_features).await {
                Ok(total) => {
                    tracing::debug!(target: "geofetch.stream", total, "Worker finished");
                }
                Err(e) if e.is_interrupted() => {
                    tracing::debug!(target: "geofetch.stream", "Worker stopped");
                }
                Err(e) => {
                    tracing::warn!(target: "geofetch.stream", error = %e, "Worker failed");
                }
            }
        });
    }
}

impl Drop for ThreadedDownloader {
    fn drop(&mut self) {
        // The worker must not outlive its handle.
        self.stop();
    }
}
