//! WFS endpoint configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// WFS protocol version, which decides parameter naming and paging support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WfsVersion {
    /// 1.0.0 / 1.1.0 family: `maxFeatures`, no `startIndex` paging.
    V1,
    /// 2.0.0: `count` plus `startIndex` paging.
    V2,
}

impl WfsVersion {
    /// Version string sent in the request.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.1.0",
            Self::V2 => "2.0.0",
        }
    }

    /// Name of the page-size parameter for this version.
    #[must_use]
    pub const fn count_param(self) -> &'static str {
        match self {
            Self::V1 => "maxFeatures",
            Self::V2 => "count",
        }
    }

    /// Whether the server understands `startIndex` paging.
    #[must_use]
    pub const fn supports_paging(self) -> bool {
        matches!(self, Self::V2)
    }
}

/// Configuration for one WFS feature-type endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WfsConfig {
    /// Base service URL, without GetFeature parameters.
    pub base_url: Url,
    /// Protocol version to speak.
    pub version: WfsVersion,
    /// Feature type name (e.g. `"my:buildings"`).
    pub type_name: String,
    /// Server-side filter expression, included verbatim after sanitization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Requested response encoding (e.g. `"application/json"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Strip namespace prefixes from decoded attribute names.
    pub remove_ns_prefix: bool,
}

impl WfsConfig {
    /// Create a configuration for a 2.0.0 endpoint with no filter.
    pub fn new(base_url: Url, type_name: impl Into<String>) -> Self {
        Self {
            base_url,
            version: WfsVersion::V2,
            type_name: type_name.into(),
            filter: None,
            output_format: None,
            remove_ns_prefix: false,
        }
    }

    /// Select the protocol version.
    #[must_use]
    pub const fn with_version(mut self, version: WfsVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the server-side filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Request a specific response encoding.
    #[must_use]
    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Strip namespace prefixes from decoded attribute names.
    #[must_use]
    pub const fn with_ns_prefix_stripping(mut self, strip: bool) -> Self {
        self.remove_ns_prefix = strip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parameter_names() {
        assert_eq!(WfsVersion::V1.count_param(), "maxFeatures");
        assert_eq!(WfsVersion::V2.count_param(), "count");
        assert!(WfsVersion::V2.supports_paging());
        assert!(!WfsVersion::V1.supports_paging());
    }

    #[test]
    fn builder_sets_fields() {
        let config = WfsConfig::new(
            Url::parse("https://example.com/wfs").unwrap(),
            "test:roads",
        )
        .with_version(WfsVersion::V1)
        .with_filter("name = 'A1'")
        .with_output_format("application/json");

        assert_eq!(config.version, WfsVersion::V1);
        assert_eq!(config.filter.as_deref(), Some("name = 'A1'"));
        assert_eq!(config.output_format.as_deref(), Some("application/json"));
    }
}
