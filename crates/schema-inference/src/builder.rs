//! Structural type builder.
//!
//! Walks a JSON value and produces its full [`FieldType`] tree. Objects keep
//! first-seen key order; array elements are folded through the merger so a
//! mixed `[1, 2.5]` becomes `array<float64>`.

use serde_json::Value;

use docport_config::{ConflictPolicy, DetectorConfig};

use crate::classifier::classify;
use crate::errors::{InferenceError, InferenceResult};
use crate::field_type::{FieldType, TypeKind};
use crate::merge::{make_path, merge};

/// Builds structural types with a fixed detector set and conflict policy.
#[derive(Debug, Clone, Copy)]
pub struct TypeBuilder<'a> {
    detect: &'a DetectorConfig,
    policy: ConflictPolicy,
}

impl<'a> TypeBuilder<'a> {
    pub fn new(detect: &'a DetectorConfig, policy: ConflictPolicy) -> Self {
        Self { detect, policy }
    }

    /// Build the type of one value.
    pub fn build(&self, value: &Value) -> InferenceResult<FieldType> {
        self.build_at(value, "")
    }

    /// Fold a batch of top-level documents into one object type and return
    /// its fields, or `None` for an empty batch.
    ///
    /// Every document must be a JSON object.
    pub fn infer_batch(
        &self,
        documents: &[Value],
    ) -> InferenceResult<Option<Vec<(String, FieldType)>>> {
        let mut acc: Option<FieldType> = None;

        for (index, doc) in documents.iter().enumerate() {
            if !doc.is_object() {
                return Err(InferenceError::NotAnObject {
                    index,
                    found: json_kind(doc),
                });
            }

            let doc_type = self.build(doc)?;
            acc = Some(match acc {
                None => doc_type,
                Some(prev) => merge(prev, doc_type, "", self.policy)?,
            });
        }

        Ok(acc.map(|t| match t.kind {
            TypeKind::Object(fields) => fields,
            _ => Vec::new(),
        }))
    }

    fn build_at(
        &self,
        value: &Value,
        path: &str,
    ) -> InferenceResult<FieldType> {
        match value {
            Value::Object(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (key, child) in map {
                    let child_type =
                        self.build_at(child, &make_path(path, key))?;
                    fields.push((key.clone(), child_type));
                }
                Ok(FieldType::object(fields))
            }
            Value::Array(items) => {
                let elem_path = format!("{}[]", path);
                let mut element = FieldType::unknown();
                for item in items {
                    let item_type = self.build_at(item, &elem_path)?;
                    element =
                        merge(element, item_type, &elem_path, self.policy)?;
                }
                Ok(FieldType::array(element))
            }
            scalar => Ok(classify(scalar, self.detect)),
        }
    }
}

/// Build the type of one value, failing on conflicts inside arrays.
pub fn build_type(
    value: &Value,
    detect: &DetectorConfig,
) -> InferenceResult<FieldType> {
    TypeBuilder::new(detect, ConflictPolicy::Fail).build(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn t(kind: TypeKind) -> FieldType {
        FieldType::new(kind)
    }

    #[test]
    fn test_nested_object_keeps_key_order() {
        let detect = DetectorConfig::default();
        let v = json!({"zeta": 1, "alpha": {"y": true, "b": null}});
        let built = build_type(&v, &detect).unwrap();

        assert_eq!(
            built,
            FieldType::object(vec![
                ("zeta".into(), t(TypeKind::Int64)),
                (
                    "alpha".into(),
                    FieldType::object(vec![
                        ("y".into(), t(TypeKind::Bool)),
                        ("b".into(), FieldType::null()),
                    ])
                ),
            ])
        );
    }

    #[test]
    fn test_mixed_numeric_array_widens() {
        let detect = DetectorConfig::default();
        let built = build_type(&json!([1, 2.5, 3]), &detect).unwrap();
        assert_eq!(built, FieldType::array(t(TypeKind::Float64)));
    }

    #[test]
    fn test_empty_array_has_unknown_element() {
        let detect = DetectorConfig::default();
        let built = build_type(&json!([]), &detect).unwrap();
        assert_eq!(built, FieldType::array(FieldType::unknown()));
    }

    #[test]
    fn test_array_of_objects_unions_fields() {
        let detect = DetectorConfig::default();
        let built =
            build_type(&json!([{"a": 1}, {"a": 2, "b": "x"}]), &detect)
                .unwrap();
        assert_eq!(
            built,
            FieldType::array(FieldType::object(vec![
                ("a".into(), t(TypeKind::Int64)),
                ("b".into(), t(TypeKind::String).into_nullable()),
            ]))
        );
    }

    #[test]
    fn test_conflicting_array_elements() {
        let detect = DetectorConfig::default();
        let err =
            build_type(&json!({"xs": [1, "two"]}), &detect).unwrap_err();
        match err {
            InferenceError::Conflict { path, .. } => assert_eq!(path, "xs[]"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_infer_batch_rejects_non_objects() {
        let detect = DetectorConfig::default();
        let builder = TypeBuilder::new(&detect, ConflictPolicy::Fail);
        let err = builder
            .infer_batch(&[json!({"a": 1}), json!([1, 2])])
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::NotAnObject {
                index: 1,
                found: "array"
            }
        ));
    }

    #[test]
    fn test_infer_batch_empty() {
        let detect = DetectorConfig::default();
        let builder = TypeBuilder::new(&detect, ConflictPolicy::Fail);
        assert!(builder.infer_batch(&[]).unwrap().is_none());
    }
}
