//! Field-type merger.
//!
//! Combines two observations of the same field into one type. The rules are
//! commutative and associative, so folding any number of samples gives the
//! same result regardless of order (object key order aside, which follows
//! first sighting).

use tracing::warn;

use docport_config::ConflictPolicy;

use crate::errors::{InferenceError, InferenceResult};
use crate::field_type::{FieldType, TypeKind};

/// Merge two types observed at `path`.
///
/// Incompatible types are reported as [`InferenceError::Conflict`] unless
/// the policy says to coerce them to `string`.
pub fn merge(
    left: FieldType,
    right: FieldType,
    path: &str,
    policy: ConflictPolicy,
) -> InferenceResult<FieldType> {
    let (ln, rn) = (left.nullable, right.nullable);
    let nullable = ln || rn;

    let kind = match (left.kind, right.kind) {
        (TypeKind::Null, other) | (other, TypeKind::Null) => other,

        (TypeKind::Int64, TypeKind::Float64)
        | (TypeKind::Float64, TypeKind::Int64) => TypeKind::Float64,

        (TypeKind::Array(l), TypeKind::Array(r)) => {
            let element = merge(*l, *r, &element_path(path), policy)?;
            TypeKind::Array(Box::new(element))
        }

        (TypeKind::Object(l), TypeKind::Object(r)) => {
            TypeKind::Object(merge_fields(l, r, path, policy)?)
        }

        (l, r) if is_same_scalar(&l, &r) => l,

        (l, r) => resolve_conflict((l, ln), (r, rn), path, policy)?,
    };

    Ok(FieldType { kind, nullable })
}

/// Field-wise union of two objects.
///
/// Left order wins; fields only on the right are appended in right order.
/// A field present on one side only becomes nullable.
pub(crate) fn merge_fields(
    left: Vec<(String, FieldType)>,
    mut right: Vec<(String, FieldType)>,
    path: &str,
    policy: ConflictPolicy,
) -> InferenceResult<Vec<(String, FieldType)>> {
    let mut out = Vec::with_capacity(left.len().max(right.len()));

    for (name, lt) in left {
        let merged = match take_field(&mut right, &name) {
            Some(rt) => merge(lt, rt, &make_path(path, &name), policy)?,
            None => lt.into_nullable(),
        };
        out.push((name, merged));
    }

    out.extend(right.into_iter().map(|(n, t)| (n, t.into_nullable())));
    Ok(out)
}

fn take_field(
    fields: &mut Vec<(String, FieldType)>,
    name: &str,
) -> Option<FieldType> {
    let pos = fields.iter().position(|(n, _)| n == name)?;
    Some(fields.remove(pos).1)
}

fn is_same_scalar(l: &TypeKind, r: &TypeKind) -> bool {
    matches!(
        (l, r),
        (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Int64, TypeKind::Int64)
            | (TypeKind::Float64, TypeKind::Float64)
            | (TypeKind::String, TypeKind::String)
            | (TypeKind::Uuid, TypeKind::Uuid)
            | (TypeKind::DateTime, TypeKind::DateTime)
            | (TypeKind::ByteArray, TypeKind::ByteArray)
    )
}

fn resolve_conflict(
    (left, left_nullable): (TypeKind, bool),
    (right, right_nullable): (TypeKind, bool),
    path: &str,
    policy: ConflictPolicy,
) -> InferenceResult<TypeKind> {
    let left = FieldType::new(left).with_nullable(left_nullable).describe();
    let right = FieldType::new(right).with_nullable(right_nullable).describe();

    match policy {
        ConflictPolicy::Fail => Err(InferenceError::Conflict {
            path: display_path(path),
            left,
            right,
        }),
        ConflictPolicy::CoerceToString => {
            warn!(
                path = %display_path(path),
                left = %left,
                right = %right,
                "incompatible field types, coercing to string"
            );
            Ok(TypeKind::String)
        }
    }
}

pub(crate) fn make_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

fn element_path(path: &str) -> String {
    format!("{}[]", path)
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(kind: TypeKind) -> FieldType {
        FieldType::new(kind)
    }

    fn m(l: FieldType, r: FieldType) -> InferenceResult<FieldType> {
        merge(l, r, "f", ConflictPolicy::Fail)
    }

    #[test]
    fn test_null_makes_nullable() {
        for kind in [TypeKind::Bool, TypeKind::Int64, TypeKind::Uuid] {
            let merged = m(t(kind.clone()), FieldType::null()).unwrap();
            assert_eq!(merged, t(kind.clone()).into_nullable());
            let merged = m(FieldType::null(), t(kind.clone())).unwrap();
            assert_eq!(merged, t(kind).into_nullable());
        }
    }

    #[test]
    fn test_unknown_is_identity() {
        let merged = m(FieldType::unknown(), t(TypeKind::String)).unwrap();
        assert_eq!(merged, t(TypeKind::String));
    }

    #[test]
    fn test_numeric_widening() {
        let merged = m(t(TypeKind::Int64), t(TypeKind::Float64)).unwrap();
        assert_eq!(merged.kind, TypeKind::Float64);
        let merged = m(t(TypeKind::Float64), t(TypeKind::Int64)).unwrap();
        assert_eq!(merged.kind, TypeKind::Float64);
        // never narrows back
        let merged = m(merged, t(TypeKind::Int64)).unwrap();
        assert_eq!(merged.kind, TypeKind::Float64);
    }

    #[test]
    fn test_nullable_is_or() {
        let merged =
            m(t(TypeKind::String).into_nullable(), t(TypeKind::String))
                .unwrap();
        assert!(merged.nullable);
    }

    #[test]
    fn test_object_union_order_and_nullability() {
        let left = FieldType::object(vec![
            ("a".into(), t(TypeKind::Int64)),
            ("b".into(), t(TypeKind::String)),
        ]);
        let right = FieldType::object(vec![
            ("c".into(), t(TypeKind::Bool)),
            ("a".into(), t(TypeKind::Float64)),
        ]);

        let merged = m(left, right).unwrap();
        assert_eq!(
            merged,
            FieldType::object(vec![
                ("a".into(), t(TypeKind::Float64)),
                ("b".into(), t(TypeKind::String).into_nullable()),
                ("c".into(), t(TypeKind::Bool).into_nullable()),
            ])
        );
    }

    #[test]
    fn test_array_elements_merge() {
        let merged = m(
            FieldType::array(t(TypeKind::Int64)),
            FieldType::array(t(TypeKind::Float64)),
        )
        .unwrap();
        assert_eq!(merged, FieldType::array(t(TypeKind::Float64)));
    }

    #[test]
    fn test_conflict_reports_path_and_types() {
        let left = FieldType::object(vec![(
            "tags".into(),
            FieldType::array(t(TypeKind::String)),
        )]);
        let right = FieldType::object(vec![(
            "tags".into(),
            FieldType::array(t(TypeKind::Bool)),
        )]);

        let err = merge(left, right, "meta", ConflictPolicy::Fail).unwrap_err();
        match err {
            InferenceError::Conflict { path, left, right } => {
                assert_eq!(path, "meta.tags[]");
                assert_eq!(left, "string");
                assert_eq!(right, "bool");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_bool_vs_int_conflicts() {
        assert!(m(t(TypeKind::Bool), t(TypeKind::Int64)).is_err());
        assert!(
            m(t(TypeKind::String), FieldType::object(vec![])).is_err()
        );
        assert!(m(t(TypeKind::Uuid), t(TypeKind::String)).is_err());
    }

    #[test]
    fn test_coerce_to_string() {
        let merged = merge(
            t(TypeKind::Bool).into_nullable(),
            t(TypeKind::Int64),
            "flag",
            ConflictPolicy::CoerceToString,
        )
        .unwrap();
        assert_eq!(merged, t(TypeKind::String).into_nullable());
    }

    #[test]
    fn test_commutative() {
        let a = FieldType::object(vec![
            ("x".into(), t(TypeKind::Int64)),
            ("y".into(), FieldType::null()),
        ]);
        let b = FieldType::object(vec![
            ("y".into(), t(TypeKind::DateTime)),
            ("z".into(), FieldType::array(t(TypeKind::Int64))),
        ]);
        let ab = m(a.clone(), b.clone()).unwrap();
        let ba = m(b, a).unwrap();

        for name in ["x", "y", "z"] {
            assert_eq!(ab.field(name), ba.field(name), "field {name}");
        }
    }
}
