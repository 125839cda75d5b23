//! Response-body decoder port.

use crate::download::DownloadResult;
use crate::feature::FeatureRecord;

/// One decoded response page.
///
/// `number_matched` is the server-reported total for the whole query (not
/// just this page), when the response carried one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPage {
    /// Records decoded from the body, in server order.
    pub records: Vec<FeatureRecord>,
    /// Total matched count for the query, if the server reported it.
    pub number_matched: Option<u64>,
}

impl DecodedPage {
    /// Create a page from records and an optional total.
    #[must_use]
    pub const fn new(records: Vec<FeatureRecord>, number_matched: Option<u64>) -> Self {
        Self {
            records,
            number_matched,
        }
    }

    /// Number of records in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Port for parsing a raw response body into typed features.
///
/// The wire format (GML, GeoJSON, ...) is the implementation's concern; the
/// downloader only sees feature+identifier pairs and the optional total.
pub trait FeatureDecoder: Send + Sync {
    /// Decode one response body.
    fn decode(&self, body: &[u8]) -> DownloadResult<DecodedPage>;
}
