//! Streaming engine for geofetch.
//!
//! Couples a background downloader (paged GetFeature requests on a
//! dedicated worker thread) with pull-based consumers: a shared
//! per-session context fans events out to subscribers, disk-spilling
//! buffers hand feature payloads across the thread boundary without
//! unbounded memory growth, and [`FeatureIterator`] presents one ordered
//! cache-then-live stream with cooperative blocking and cancellation.

#![deny(unused_crate_dependencies)]

mod context;
mod downloader;
mod iterator;
mod source;
mod spill;
mod thread;

pub use context::{DownloadState, SharedDownloadContext, Subscription, SubscriptionMode};
pub use downloader::Downloader;
pub use iterator::FeatureIterator;
pub use source::FeatureSource;
pub use spill::SpillBuffer;
pub use thread::ThreadedDownloader;

// Silence unused dev-dependency warnings (used by integration tests)
#[cfg(test)]
use tracing_subscriber as _;
