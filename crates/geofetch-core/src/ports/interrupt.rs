//! External interruption port.

use std::sync::atomic::{AtomicBool, Ordering};

/// External cancellation source polled by a waiting iterator.
///
/// Polled, not push-cancelled: the source is not assumed to be capable of
/// signalling an event, so iterators check it at a fixed interval while
/// suspended.
pub trait InterruptionChecker: Send + Sync {
    /// Whether the external source has requested an abort.
    fn is_interrupted(&self) -> bool;
}

/// A plain shared flag is the simplest interruption source.
impl InterruptionChecker for AtomicBool {
    fn is_interrupted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}
