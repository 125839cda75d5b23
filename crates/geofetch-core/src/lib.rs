//! Core domain types and ports for geofetch.
//!
//! This crate holds the pure data model (features, schemas, queries), the
//! download event/error vocabulary, the shared configuration, and the trait
//! boundaries (ports) that the protocol and streaming crates implement.
//! It performs no I/O of its own.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod download;
pub mod feature;
pub mod ports;
pub mod query;

// Re-export commonly used types for convenience
pub use config::DownloadConfig;
pub use download::{DownloadError, DownloadEvent, DownloadResult};
pub use feature::{Feature, FeatureRecord, FeatureSchema, FieldDef, FieldType, FieldValue, Geometry};
pub use ports::{
    DecodedPage, FeatureCache, FeatureDecoder, FeaturePageSource, GeometryTransform,
    IdentityTransform, InterruptionChecker, MemoryFeatureCache, NoopProgressSink, ProgressSink,
};
pub use query::{BoundingBox, FeatureQuery};
