//! Value type classifier.
//!
//! Maps a single JSON value to its most specific [`FieldType`]. Strings are
//! run through the enabled format detectors in a fixed order: UUID, then
//! date-time, then byte array. Byte-array detection goes last because
//! hex-only strings and many plain words are valid base64 too.

use base64::prelude::*;
use chrono::DateTime;
use serde_json::{Number, Value};
use uuid::Uuid;

use docport_config::DetectorConfig;

use crate::field_type::{FieldType, TypeKind};

/// Classify one JSON value.
///
/// Arrays and objects get an empty container type (`array` of nothing,
/// `object` without fields); the builder fills in their contents.
pub fn classify(value: &Value, detect: &DetectorConfig) -> FieldType {
    match value {
        Value::Null => FieldType::null(),
        Value::Bool(_) => FieldType::new(TypeKind::Bool),
        Value::Number(n) => FieldType::new(classify_number(n, detect)),
        Value::String(s) => FieldType::new(classify_string(s, detect)),
        Value::Array(_) => FieldType::array(FieldType::unknown()),
        Value::Object(_) => FieldType::object(Vec::new()),
    }
}

fn classify_number(n: &Number, detect: &DetectorConfig) -> TypeKind {
    // Float literals and integers beyond i64 fall through to Float64.
    if detect.integers && n.as_i64().is_some() {
        TypeKind::Int64
    } else {
        TypeKind::Float64
    }
}

fn classify_string(s: &str, detect: &DetectorConfig) -> TypeKind {
    if detect.uuids && is_uuid(s) {
        TypeKind::Uuid
    } else if detect.times && is_date_time(s) {
        TypeKind::DateTime
    } else if detect.byte_arrays && is_base64(s) {
        TypeKind::ByteArray
    } else {
        TypeKind::String
    }
}

/// Canonical 8-4-4-4-12 hyphenated form only.
fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 36
        && [8, 13, 18, 23].iter().all(|&i| bytes[i] == b'-')
        && Uuid::try_parse(s).is_ok()
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_base64(s: &str) -> bool {
    !s.is_empty() && s.len() % 4 == 0 && BASE64_STANDARD.decode(s).is_ok()
}
