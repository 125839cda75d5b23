//! Geometry transform port.

use crate::download::DownloadResult;
use crate::feature::Geometry;

/// Port for per-feature CRS transforms.
///
/// Applied by the iterator when the query requests a target CRS. The
/// transform math itself lives behind this boundary.
pub trait GeometryTransform: Send + Sync {
    /// Transform `geometry` in place into the target CRS.
    fn transform(&self, geometry: &mut Geometry) -> DownloadResult<()>;
}

/// Leaves geometries in the layer CRS.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTransform;

impl IdentityTransform {
    /// Create a new identity transform.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl GeometryTransform for IdentityTransform {
    fn transform(&self, _geometry: &mut Geometry) -> DownloadResult<()> {
        Ok(())
    }
}
