//! Port definitions (trait abstractions).
//!
//! These traits isolate the streaming engine from infrastructure concerns:
//! the wire decoder, the network page source, the local feature cache, the
//! progress presentation layer, CRS transforms and external cancellation.

mod cache;
mod decoder;
mod interrupt;
mod progress;
mod source;
mod transform;

pub use cache::{FeatureCache, MemoryFeatureCache};
pub use decoder::{DecodedPage, FeatureDecoder};
pub use interrupt::InterruptionChecker;
pub use progress::{NoopProgressSink, ProgressSink};
pub use source::FeaturePageSource;
pub use transform::{GeometryTransform, IdentityTransform};
