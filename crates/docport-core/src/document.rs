//! Raw JSON documents.

use bytes::Bytes;
use serde_json::{Map, Value};

/// One JSON document as raw bytes.
///
/// The bytes are kept as received; nothing checks they parse until the
/// document is inspected or inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document(Bytes);

impl Document {
    /// Copy a byte slice into a new document.
    pub fn from_slice(raw: &[u8]) -> Self {
        Document(Bytes::copy_from_slice(raw))
    }

    pub fn from_bytes(raw: Bytes) -> Self {
        Document(raw)
    }

    /// Serialize a parsed value.
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        serde_json::to_vec(value).map(|v| Document(Bytes::from(v)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.0)
    }

    /// Remove `null` members and empty arrays.
    ///
    /// Applies to the top-level object and to nested objects reached
    /// through object members; array elements are left as they are. A
    /// document that is not a JSON object comes back unchanged, and so do
    /// bytes that do not parse.
    pub fn cleanup_null_values(&self) -> Document {
        match self.to_value() {
            Ok(Value::Object(map)) => {
                let cleaned = Value::Object(strip_nulls(map));
                Document::from_value(&cleaned).unwrap_or_else(|_| self.clone())
            }
            _ => self.clone(),
        }
    }
}

fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Array(items) if items.is_empty() => None,
            Value::Object(inner) => {
                Some((key, Value::Object(strip_nulls(inner))))
            }
            other => Some((key, other)),
        })
        .collect()
}

impl AsRef<[u8]> for Document {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Document {
    fn from(raw: Vec<u8>) -> Self {
        Document(Bytes::from(raw))
    }
}

impl From<Bytes> for Document {
    fn from(raw: Bytes) -> Self {
        Document(raw)
    }
}

/// Apply [`Document::cleanup_null_values`] to a whole batch.
pub fn cleanup_batch(documents: &[Document]) -> Vec<Document> {
    documents.iter().map(Document::cleanup_null_values).collect()
}
