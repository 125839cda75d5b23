//! JSON feature-collection decoder.
//!
//! The default [`geofetch_core::FeatureDecoder`]: parses a JSON feature
//! collection into schema-aligned records. Other wire formats plug in
//! behind the same port.

use serde::Deserialize;
use serde_json::Value;

use geofetch_core::{
    BoundingBox, DecodedPage, DownloadError, DownloadResult, Feature, FeatureDecoder,
    FeatureRecord, FeatureSchema, FieldType, FieldValue, Geometry,
};

/// Decoder for JSON feature collections.
pub struct JsonFeatureDecoder {
    schema: FeatureSchema,
    remove_ns_prefix: bool,
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(rename = "numberMatched")]
    number_matched: Option<u64>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
}

impl JsonFeatureDecoder {
    /// Create a decoder aligning properties to `schema`.
    #[must_use]
    pub const fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            remove_ns_prefix: false,
        }
    }

    /// Strip namespace prefixes (`ns:name` → `name`) from property names
    /// before schema lookup.
    #[must_use]
    pub const fn with_ns_prefix_stripping(mut self, strip: bool) -> Self {
        self.remove_ns_prefix = strip;
        self
    }

    fn decode_feature(&self, index: usize, raw: RawFeature) -> DownloadResult<FeatureRecord> {
        let id = raw
            .id
            .as_ref()
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                DownloadError::protocol(format!("feature {index} has no usable identifier"))
            })?;

        let mut attributes = vec![FieldValue::Null; self.schema.field_count()];
        for (name, value) in &raw.properties {
            let local = if self.remove_ns_prefix {
                name.rsplit(':').next().unwrap_or(name)
            } else {
                name.as_str()
            };
            if let Some(field_index) = self.schema.field_index(local) {
                attributes[field_index] =
                    field_value(value, self.schema.fields[field_index].field_type);
            }
        }

        let mut feature = Feature::new(attributes);
        if let Some(geometry) = raw.geometry.filter(|v| !v.is_null()) {
            let data = serde_json::to_vec(&geometry)
                .map_err(|e| DownloadError::protocol(format!("unencodable geometry: {e}")))?;
            let bbox = raw.bbox.as_deref().and_then(bbox_from_slice);
            feature = feature.with_geometry(Geometry::new(data, bbox));
        }

        Ok(FeatureRecord::new(feature, id))
    }
}

impl FeatureDecoder for JsonFeatureDecoder {
    fn decode(&self, body: &[u8]) -> DownloadResult<DecodedPage> {
        let collection: RawCollection = serde_json::from_slice(body)
            .map_err(|e| DownloadError::protocol(format!("malformed feature collection: {e}")))?;

        let records = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, raw)| self.decode_feature(index, raw))
            .collect::<DownloadResult<Vec<_>>>()?;

        Ok(DecodedPage::new(records, collection.number_matched))
    }
}

/// Convert a JSON property value into the schema's declared type.
/// Mismatched or unrepresentable values decode to `Null`.
fn field_value(value: &Value, field_type: FieldType) -> FieldValue {
    match field_type {
        FieldType::String => match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Number(n) => FieldValue::String(n.to_string()),
            Value::Bool(b) => FieldValue::String(b.to_string()),
            _ => FieldValue::Null,
        },
        FieldType::Integer => value.as_i64().map_or(FieldValue::Null, FieldValue::Integer),
        FieldType::Double => value.as_f64().map_or(FieldValue::Null, FieldValue::Double),
        FieldType::Boolean => value.as_bool().map_or(FieldValue::Null, FieldValue::Boolean),
    }
}

fn bbox_from_slice(bbox: &[f64]) -> Option<BoundingBox> {
    match bbox {
        [min_x, min_y, max_x, max_y] => Some(BoundingBox::new(*min_x, *min_y, *max_x, *max_y)),
        _ => None,
    }
}
