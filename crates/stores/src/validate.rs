//! Document checks against a stored schema.

use serde_json::{Map, Value};

use docport_core::{Document, StoreError, StoreResult};
use schema_inference::{FieldType, Schema, TypeKind};

/// Parse stored schema bytes, reporting garbage as an invalid argument.
pub(crate) fn parse_schema(
    collection: &str,
    bytes: &[u8],
) -> StoreResult<Schema> {
    Schema::from_slice(bytes).map_err(|e| {
        StoreError::invalid_argument(format!(
            "collection '{collection}': {e}"
        ))
    })
}

/// Check every document of a batch; the first failure rejects the batch.
pub(crate) fn validate_batch(
    schema: &Schema,
    documents: &[Document],
) -> StoreResult<()> {
    for (index, doc) in documents.iter().enumerate() {
        let value = doc.to_value().map_err(|e| {
            StoreError::invalid_argument(format!(
                "document {index} is not valid JSON: {e}"
            ))
        })?;
        validate_document(schema, &value).map_err(|reason| {
            StoreError::invalid_argument(format!("document {index}: {reason}"))
        })?;
    }
    Ok(())
}

/// Rules: every member must be a known field of a matching type, `null`
/// only where the field is nullable, and primary key fields that are not
/// auto generated must be present.
pub(crate) fn validate_document(
    schema: &Schema,
    value: &Value,
) -> Result<(), String> {
    let Value::Object(map) = value else {
        return Err("not a JSON object".to_string());
    };

    for (name, member) in map {
        let Some(field) = schema.field(name) else {
            return Err(format!("unknown field '{name}'"));
        };
        check_value(&field.field_type, member, name)?;
    }

    for field in &schema.fields {
        if field.is_primary_key
            && !field.is_auto_generated
            && !map.contains_key(&field.name)
        {
            return Err(format!("missing primary key field '{}'", field.name));
        }
    }
    Ok(())
}

fn check_value(
    expected: &FieldType,
    value: &Value,
    path: &str,
) -> Result<(), String> {
    if value.is_null() {
        return if expected.nullable {
            Ok(())
        } else {
            Err(format!("field '{path}' is not nullable"))
        };
    }

    let ok = match (&expected.kind, value) {
        (TypeKind::Bool, Value::Bool(_)) => true,
        (TypeKind::Int64, Value::Number(n)) => n.as_i64().is_some(),
        (TypeKind::Float64, Value::Number(_)) => true,
        (
            TypeKind::String
            | TypeKind::Uuid
            | TypeKind::DateTime
            | TypeKind::ByteArray,
            Value::String(_),
        ) => true,
        (TypeKind::Array(element), Value::Array(items)) => {
            let elem_path = format!("{path}[]");
            for item in items {
                check_value(element, item, &elem_path)?;
            }
            true
        }
        (TypeKind::Object(fields), Value::Object(map)) => {
            check_object(fields, map, path)?;
            true
        }
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "field '{path}' expects {}, got {}",
            expected.describe(),
            json_kind(value)
        ))
    }
}

fn check_object(
    fields: &[(String, FieldType)],
    map: &Map<String, Value>,
    path: &str,
) -> Result<(), String> {
    for (name, member) in map {
        let child_path = format!("{path}.{name}");
        let Some((_, child)) = fields.iter().find(|(n, _)| n == name) else {
            return Err(format!("unknown field '{child_path}'"));
        };
        check_value(child, member, &child_path)?;
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.as_i64().is_some() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collection names end up in file names.
pub(crate) fn check_collection_name(collection: &str) -> StoreResult<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_argument(format!(
            "invalid collection name '{collection}'"
        )))
    }
}
