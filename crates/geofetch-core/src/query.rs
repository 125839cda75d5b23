//! Query descriptors for feature requests.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding rectangle in the layer CRS.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x coordinate.
    pub min_x: f64,
    /// Minimum y coordinate.
    pub min_y: f64,
    /// Maximum x coordinate.
    pub max_x: f64,
    /// Maximum y coordinate.
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a bounding box from min/max corners.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whether the two rectangles share any area (touching edges count).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// A feature request: which attributes, which area, how many.
///
/// Pure data; the iterator interprets it. An empty `attributes` list means
/// "all fields". `limit == 0` means "no client-imposed cap".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureQuery {
    /// Subset of attribute names to materialize; empty = all.
    pub attributes: Vec<String>,
    /// Spatial filter rectangle; features outside it are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_rect: Option<BoundingBox>,
    /// Target CRS authority identifier (e.g. `"EPSG:4326"`) when the caller
    /// wants geometries transformed. `None` = keep the layer CRS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_crs: Option<String>,
    /// Maximum number of features to yield; 0 = unbounded.
    pub limit: u64,
}

impl FeatureQuery {
    /// A query for everything: all attributes, no filter, no limit.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict the query to a subset of attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the spatial filter rectangle.
    #[must_use]
    pub const fn with_filter_rect(mut self, rect: BoundingBox) -> Self {
        self.filter_rect = Some(rect);
        self
    }

    /// Request a CRS transform for returned geometries.
    #[must_use]
    pub fn with_target_crs(mut self, crs: impl Into<String>) -> Self {
        self.target_crs = Some(crs.into());
        self
    }

    /// Cap the number of returned features.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Whether the caller asked for an attribute subset.
    #[must_use]
    pub fn has_attribute_subset(&self) -> bool {
        !self.attributes.is_empty()
    }
}
