//! Record payloads.
//!
//! Payloads are a tagged union rather than a free-form JSON map: form data
//! travels as an ordered field map (the representation the conflict differ
//! works on), file attachments travel as a base64 blob with a content type.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered field-name to value map. Ordering is part of the contract: the
/// differ and the export format both rely on a stable field order.
pub type FieldMap = BTreeMap<String, Value>;

/// The content of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Structured form data as an ordered field map.
    Fields(FieldMap),

    /// A binary attachment (photo, signature, scanned document).
    Blob {
        /// Base64-encoded file bytes.
        bytes: String,
        /// MIME content type (e.g. "image/jpeg").
        content_type: String,
    },
}

impl Payload {
    /// Creates an empty fields payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::Fields(FieldMap::new())
    }

    /// Creates a fields payload from a JSON object value.
    ///
    /// Fails if the value is not an object; scalar or array roots have no
    /// field names for the differ to work with.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::Fields(map.into_iter().collect())),
            other => Err(Error::InvalidPayload(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Creates a blob payload from raw bytes.
    #[must_use]
    pub fn blob(bytes: &[u8], content_type: impl Into<String>) -> Self {
        Self::Blob {
            bytes: BASE64.encode(bytes),
            content_type: content_type.into(),
        }
    }

    /// Returns the decoded bytes of a blob payload, `None` for field payloads.
    pub fn blob_bytes(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Blob { bytes, .. } => BASE64
                .decode(bytes)
                .map(Some)
                .map_err(|e| Error::InvalidPayload(format!("invalid base64 blob: {e}"))),
            Self::Fields(_) => Ok(None),
        }
    }

    /// Returns the field map, `None` for blob payloads.
    #[must_use]
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            Self::Fields(map) => Some(map),
            Self::Blob { .. } => None,
        }
    }

    /// Returns a single field value by name, `None` for blobs or missing fields.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields().and_then(|map| map.get(field))
    }

    /// Serializes the payload to its canonical wire/storage encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a payload from its canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Size of the canonical encoding in bytes (pre-compression), the unit
    /// the storage quota is measured in.
    pub fn encoded_len(&self) -> Result<u64> {
        Ok(self.encode()?.len() as u64)
    }
}
