//! Download vocabulary: events and errors shared across crates.

mod errors;
mod events;

pub use errors::{DownloadError, DownloadResult};
pub use events::DownloadEvent;
