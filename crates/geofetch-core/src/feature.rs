//! Feature data model.
//!
//! Pure data types with no I/O dependencies. A [`FeatureRecord`] pairs a
//! decoded feature with the opaque identifier assigned by the server and is
//! immutable once produced.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::BoundingBox;

/// Type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Double,
    /// Boolean.
    Boolean,
}

/// A single attribute value.
///
/// Attribute encodings richer than this are the decoder's concern; the
/// streaming layer only moves values around.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Missing / unset attribute.
    Null,
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
}

impl FieldValue {
    /// Whether this value is the null sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Definition of one schema field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as exposed to callers.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
}

impl FieldDef {
    /// Create a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered, named field list describing one feature type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Feature type name (e.g. `"my:buildings"`).
    pub type_name: String,
    /// Ordered field definitions.
    pub fields: Vec<FieldDef>,
}

impl FeatureSchema {
    /// Create a schema from a type name and field list.
    pub fn new(type_name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Index of a field by name, if present.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Opaque encoded geometry plus the bounding box used for spatial filtering.
///
/// The wire encoding of `data` is owned by the decoder; the streaming layer
/// treats it as bytes and only consults `bbox`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Encoded geometry bytes.
    pub data: Vec<u8>,
    /// Precomputed bounding box, if the decoder could derive one.
    pub bbox: Option<BoundingBox>,
}

impl Geometry {
    /// Create a geometry from encoded bytes and an optional bounding box.
    #[must_use]
    pub const fn new(data: Vec<u8>, bbox: Option<BoundingBox>) -> Self {
        Self { data, bbox }
    }
}

/// One decoded feature: attributes aligned to a [`FeatureSchema`] plus an
/// optional geometry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Attribute values, positionally aligned to the schema's fields.
    /// Fields the server omitted (or the query excluded) are `Null`.
    pub attributes: Vec<FieldValue>,
    /// Geometry, if fetched.
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// Create a feature with the given attributes and no geometry.
    #[must_use]
    pub const fn new(attributes: Vec<FieldValue>) -> Self {
        Self {
            attributes,
            geometry: None,
        }
    }

    /// Attach a geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Attribute value at `index`, or `Null` when out of range.
    #[must_use]
    pub fn attribute(&self, index: usize) -> &FieldValue {
        self.attributes.get(index).unwrap_or(&FieldValue::Null)
    }
}

/// A decoded feature paired with the server-assigned identifier.
///
/// Immutable once produced by the decoder; this is the unit that flows from
/// the page fetcher through the downloader to caches and iterators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// The decoded feature payload.
    pub feature: Feature,
    /// Opaque identifier (e.g. a gml:id), unique per feature type.
    pub id: String,
}

impl FeatureRecord {
    /// Create a record from a feature and its identifier.
    pub fn new(feature: Feature, id: impl Into<String>) -> Self {
        Self {
            feature,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            "test:points",
            vec![
                FieldDef::new("name", FieldType::String),
                FieldDef::new("height", FieldType::Double),
            ],
        )
    }

    #[test]
    fn field_index_lookup() {
        let s = schema();
        assert_eq!(s.field_index("name"), Some(0));
        assert_eq!(s.field_index("height"), Some(1));
        assert_eq!(s.field_index("missing"), None);
    }

    #[test]
    fn attribute_out_of_range_is_null() {
        let f = Feature::new(vec![FieldValue::Integer(3)]);
        assert_eq!(f.attribute(0), &FieldValue::Integer(3));
        assert!(f.attribute(5).is_null());
    }

    #[test]
    fn record_serialization_round_trip() {
        let record = FeatureRecord::new(
            Feature::new(vec![
                FieldValue::String("tower".into()),
                FieldValue::Double(12.5),
            ])
            .with_geometry(Geometry::new(vec![1, 2, 3], None)),
            "points.42",
        );

        let json = serde_json::to_string(&record).unwrap();
        let parsed: FeatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
