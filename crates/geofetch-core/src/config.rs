//! Download configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the downloader, the page source and iterators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Features requested per page when server paging is available.
    pub page_size: u64,
    /// Whether the server supports `startIndex`-based paging. When false the
    /// downloader issues exactly one request regardless of result size.
    pub paging_enabled: bool,
    /// Bytes buffered in memory per subscriber before spilling to disk.
    pub spill_threshold_bytes: usize,
    /// How often a waiting iterator polls its interruption checker.
    pub interruption_poll_interval: Duration,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
    /// User-Agent header value for outgoing requests.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            paging_enabled: true,
            spill_threshold_bytes: 1024 * 1024,
            interruption_poll_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("geofetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    /// Set the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable or disable server paging.
    #[must_use]
    pub const fn with_paging_enabled(mut self, enabled: bool) -> Self {
        self.paging_enabled = enabled;
        self
    }

    /// Set the per-subscriber spill threshold in bytes.
    #[must_use]
    pub const fn with_spill_threshold_bytes(mut self, bytes: usize) -> Self {
        self.spill_threshold_bytes = bytes;
        self
    }

    /// Set the interruption poll interval.
    #[must_use]
    pub const fn with_interruption_poll_interval(mut self, interval: Duration) -> Self {
        self.interruption_poll_interval = interval;
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
