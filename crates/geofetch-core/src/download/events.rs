//! Download events - discriminated union for downloader state changes.
//!
//! Subscribers receive these over their subscription channel. Feature
//! payloads never travel inside events; payload subscribers get records
//! through their spill sink and everyone else re-reads the shared cache.

use serde::{Deserialize, Serialize};

/// Single discriminated union for all downloader events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A batch of features was received; `count` is the batch size.
    /// Payload subscribers will find the records in their spill sink.
    FeaturesReceived {
        /// Number of features in the batch.
        count: u64,
    },

    /// Cumulative progress after a page completed.
    Progress {
        /// Total features downloaded so far in this session.
        current: u64,
        /// Authoritative total from the hits probe, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Terminal event: no further events follow for this session.
    EndOfDownload {
        /// Whether the download ran to natural completion.
        success: bool,
    },
}

impl DownloadEvent {
    /// Create a batch-received event.
    #[must_use]
    pub const fn features_received(count: u64) -> Self {
        Self::FeaturesReceived { count }
    }

    /// Create a progress event.
    #[must_use]
    pub const fn progress(current: u64, total: Option<u64>) -> Self {
        Self::Progress { current, total }
    }

    /// Create the terminal event.
    #[must_use]
    pub const fn end_of_download(success: bool) -> Self {
        Self::EndOfDownload { success }
    }

    /// Whether this is the terminal event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfDownload { .. })
    }

    /// Progress percentage for this event, when computable.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        match self {
            Self::Progress {
                current,
                total: Some(total),
            } if *total > 0 => {
                #[allow(clippy::cast_precision_loss)]
                Some((*current as f64 / *total as f64) * 100.0)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_requires_known_total() {
        assert_eq!(
            DownloadEvent::progress(50, Some(200)).percentage(),
            Some(25.0)
        );
        assert_eq!(DownloadEvent::progress(50, None).percentage(), None);
        assert_eq!(DownloadEvent::progress(50, Some(0)).percentage(), None);
        assert_eq!(DownloadEvent::end_of_download(true).percentage(), None);
    }

    #[test]
    fn terminal_detection() {
        assert!(DownloadEvent::end_of_download(false).is_terminal());
        assert!(!DownloadEvent::features_received(10).is_terminal());
    }

    #[test]
    fn event_serialization_is_tagged() {
        let json = serde_json::to_string(&DownloadEvent::progress(10, None)).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        // Unknown totals are omitted entirely.
        assert!(!json.contains("total"));
    }
}
