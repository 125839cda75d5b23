//! WFS protocol boundary for geofetch.
//!
//! Implements the network side of feature retrieval: GetFeature URL
//! construction with paging parameters, filter sanitization, an HTTP
//! backend abstraction, the count-only hits probe, and a page source
//! that fetches and decodes one page at a time. The concurrency engine
//! in `geofetch-stream` drives everything through the
//! [`geofetch_core::FeaturePageSource`] port.

#![deny(unused_crate_dependencies)]

mod config;
mod decode;
mod hits;
mod http;
mod page;
mod url;

pub use config::{WfsConfig, WfsVersion};
pub use decode::JsonFeatureDecoder;
pub use hits::HitsProbe;
pub use http::{HttpBackend, ReqwestBackend};
pub use page::WfsPageSource;
pub use url::{build_get_feature_url, sanitize_filter};
