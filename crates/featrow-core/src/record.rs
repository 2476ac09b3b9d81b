use crate::serde_utils::bytes_serde;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single feature value within a row.
///
/// The value bytes are opaque to the ingestion layer; only byte-exact
/// round-tripping is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureField {
    /// Feature identifier (e.g., "driver.trips_today")
    pub id: String,

    /// Opaque feature value
    #[serde(with = "bytes_serde")]
    pub value: Bytes,
}

impl FeatureField {
    /// Create a new feature field
    pub fn new(id: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// The canonical record every ingestion source is normalized into.
///
/// A feature row carries the values observed for one entity at one point in
/// time. Downstream consumers interpret the field values; this layer only
/// moves and round-trips them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Entity type this row describes (e.g., "driver")
    pub entity_name: String,

    /// Entity instance key (e.g., "driver-1337")
    pub entity_key: String,

    /// Observation timestamp, milliseconds since epoch
    pub event_timestamp_ms: i64,

    /// Feature values, in source order
    pub fields: Vec<FeatureField>,
}

impl FeatureRow {
    /// Create a new row with no fields
    pub fn new(
        entity_name: impl Into<String>,
        entity_key: impl Into<String>,
        event_timestamp_ms: i64,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            entity_key: entity_key.into(),
            event_timestamp_ms,
            fields: Vec::new(),
        }
    }

    /// Append a feature value (builder-style)
    pub fn with_field(mut self, id: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.fields.push(FeatureField::new(id, value));
        self
    }

    /// Look up a feature value by id
    pub fn field(&self, id: &str) -> Option<&Bytes> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    /// Approximate in-memory payload size (key + field ids + values)
    pub fn size(&self) -> usize {
        let fields: usize = self.fields.iter().map(|f| f.id.len() + f.value.len()).sum();
        self.entity_name.len() + self.entity_key.len() + fields
    }

    /// Serialize to canonical wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::CodecError> {
        crate::codec::encode(self)
    }

    /// Deserialize from canonical wire bytes (strict, no partial decode)
    pub fn from_bytes(data: &[u8]) -> Result<Self, crate::CodecError> {
        crate::codec::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_builder() {
        let row = FeatureRow::new("driver", "driver-42", 1_700_000_000_000)
            .with_field("trips_today", b"7".to_vec())
            .with_field("rating", b"4.9".to_vec());

        assert_eq!(row.entity_name, "driver");
        assert_eq!(row.entity_key, "driver-42");
        assert_eq!(row.fields.len(), 2);
        assert_eq!(row.field("rating"), Some(&Bytes::from(b"4.9".to_vec())));
        assert_eq!(row.field("missing"), None);
    }

    #[test]
    fn test_row_size() {
        let row = FeatureRow::new("e", "k", 0).with_field("id", b"value".to_vec());
        // "e" + "k" + "id" + "value"
        assert_eq!(row.size(), 1 + 1 + 2 + 5);
    }
}
