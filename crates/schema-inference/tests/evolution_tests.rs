//! Batch evolution behaviour of the schema accumulator.
//!
//! Run with: cargo test -p schema-inference --test evolution_tests

use pretty_assertions::assert_eq;
use schema_inference::{
    ConflictPolicy, DetectorConfig, EvolveOutcome, FieldType, Schema,
    SchemaAccumulator, TypeKind, merge,
};
use serde_json::{Value, json};

fn accumulator(collection: &str) -> SchemaAccumulator {
    SchemaAccumulator::new(
        collection,
        DetectorConfig::default(),
        ConflictPolicy::Fail,
    )
}

fn raw(values: &[Value]) -> Vec<Vec<u8>> {
    values
        .iter()
        .map(|v| serde_json::to_vec(v).unwrap())
        .collect()
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Field types with object members sorted by name, for comparisons that
/// must ignore first-seen order.
fn normalized(t: &FieldType) -> FieldType {
    let kind = match &t.kind {
        TypeKind::Object(fields) => {
            let mut fields: Vec<_> = fields
                .iter()
                .map(|(n, f)| (n.clone(), normalized(f)))
                .collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            TypeKind::Object(fields)
        }
        TypeKind::Array(element) => {
            TypeKind::Array(Box::new(normalized(element)))
        }
        other => other.clone(),
    };
    FieldType {
        kind,
        nullable: t.nullable,
    }
}

fn normalized_schema(schema: &Schema) -> Vec<(String, FieldType, bool)> {
    let mut out: Vec<_> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), normalized(&f.field_type), f.is_primary_key))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[test]
fn first_batch_with_primary_key() {
    let mut acc = accumulator("people");
    let batch = raw(&[
        json!({"id": 1, "name": "a"}),
        json!({"id": 2, "name": "b", "age": 30}),
    ]);

    let outcome = acc.evolve(&batch, &keys(&["id"]), &[], 2).unwrap();
    assert!(outcome.is_changed());

    let schema = acc.schema();
    assert_eq!(schema.field_names().collect::<Vec<_>>(), ["id", "name", "age"]);

    let id = schema.field("id").unwrap();
    assert_eq!(id.field_type, FieldType::new(TypeKind::Int64));
    assert!(id.is_primary_key);

    let name = schema.field("name").unwrap();
    assert_eq!(name.field_type, FieldType::new(TypeKind::String));
    assert!(!name.is_primary_key);

    let age = schema.field("age").unwrap();
    assert_eq!(
        age.field_type,
        FieldType::new(TypeKind::Int64).into_nullable()
    );
    assert_eq!(schema.primary_key, keys(&["id"]));
}

#[test]
fn int_widens_to_float_across_batches() {
    let mut acc = accumulator("readings");

    let first = acc
        .evolve(&raw(&[json!({"id": 1, "val": 5})]), &[], &[], 0)
        .unwrap();
    assert!(first.is_changed());
    assert_eq!(
        acc.schema().field("val").unwrap().field_type.kind,
        TypeKind::Int64
    );

    let second = acc
        .evolve(&raw(&[json!({"id": 2, "val": 5.5})]), &[], &[], 0)
        .unwrap();
    assert!(matches!(second, EvolveOutcome::Evolved { .. }));
    assert_eq!(
        acc.schema().field("val").unwrap().field_type.kind,
        TypeKind::Float64
    );

    // an integer afterwards never narrows it back
    let third = acc
        .evolve(&raw(&[json!({"id": 3, "val": 7})]), &[], &[], 0)
        .unwrap();
    assert!(!third.is_changed());
    assert_eq!(
        acc.schema().field("val").unwrap().field_type.kind,
        TypeKind::Float64
    );
}

#[test]
fn uuid_detection_toggle() {
    let doc = raw(&[json!({"ref": "123e4567-e89b-12d3-a456-426614174000"})]);

    let mut on = accumulator("refs");
    on.evolve(&doc, &[], &[], 0).unwrap();
    assert_eq!(
        on.schema().field("ref").unwrap().field_type.kind,
        TypeKind::Uuid
    );

    let mut off = SchemaAccumulator::new(
        "refs",
        DetectorConfig {
            uuids: false,
            ..Default::default()
        },
        ConflictPolicy::Fail,
    );
    off.evolve(&doc, &[], &[], 0).unwrap();
    assert_eq!(
        off.schema().field("ref").unwrap().field_type.kind,
        TypeKind::String
    );
}

#[test]
fn identical_batch_is_unchanged() {
    let mut acc = accumulator("events");
    let batch = raw(&[
        json!({"id": 1, "tags": ["x"], "meta": {"src": "web"}}),
        json!({"id": 2, "tags": [], "meta": {"src": "app", "v": 2}}),
    ]);

    let first = acc.evolve(&batch, &keys(&["id"]), &[], 0).unwrap();
    assert!(matches!(first, EvolveOutcome::NewSchema { .. }));

    let second = acc.evolve(&batch, &keys(&["id"]), &[], 0).unwrap();
    assert!(!second.is_changed());
    assert!(second.schema_bytes().is_none());
    assert_eq!(second.fingerprint(), first.fingerprint());
    assert_eq!(second.sequence(), first.sequence());
}

#[test]
fn merge_order_does_not_matter() {
    let a = json!({
        "id": 1,
        "score": 3,
        "meta": {"a": true},
        "list": [1, 2]
    });
    let b = json!({
        "id": 2,
        "score": 2.5,
        "meta": {"b": "x"},
        "list": [],
        "note": null
    });

    let mut ab = accumulator("t");
    ab.evolve(&raw(&[a.clone()]), &[], &[], 0).unwrap();
    ab.evolve(&raw(&[b.clone()]), &[], &[], 0).unwrap();

    let mut ba = accumulator("t");
    ba.evolve(&raw(&[b]), &[], &[], 0).unwrap();
    ba.evolve(&raw(&[a]), &[], &[], 0).unwrap();

    assert_eq!(
        normalized_schema(ab.schema()),
        normalized_schema(ba.schema())
    );

    let meta = &ab.schema().field("meta").unwrap().field_type;
    assert!(meta.field("a").unwrap().nullable);
    assert!(meta.field("b").unwrap().nullable);
    assert_eq!(
        ab.schema().field("score").unwrap().field_type.kind,
        TypeKind::Float64
    );
}

#[test]
fn merging_with_null_marks_nullable() {
    let kinds = [
        TypeKind::Bool,
        TypeKind::Int64,
        TypeKind::Float64,
        TypeKind::String,
        TypeKind::Uuid,
        TypeKind::DateTime,
        TypeKind::ByteArray,
    ];

    for kind in kinds {
        let t = FieldType::new(kind.clone());
        let null = FieldType::null();
        let policy = ConflictPolicy::Fail;
        let left = merge(t.clone(), null.clone(), "f", policy).unwrap();
        let right = merge(null, t, "f", policy).unwrap();

        assert_eq!(left, FieldType::new(kind.clone()).into_nullable());
        assert_eq!(left, right);
    }
}

#[test]
fn null_first_then_value() {
    let mut acc = accumulator("t");
    acc.evolve(&raw(&[json!({"a": 1, "b": null})]), &[], &[], 0)
        .unwrap();
    assert_eq!(
        acc.schema().field("b").unwrap().field_type,
        FieldType::null()
    );

    acc.evolve(&raw(&[json!({"a": 2, "b": "now"})]), &[], &[], 0)
        .unwrap();
    assert_eq!(
        acc.schema().field("b").unwrap().field_type,
        FieldType::new(TypeKind::String).into_nullable()
    );
}

#[test]
fn fields_past_depth_are_ignored() {
    let mut acc = accumulator("t");
    let batch = raw(&[
        json!({"id": 1}),
        json!({"id": 2}),
        json!({"id": 3, "late": true}),
    ]);

    acc.evolve(&batch, &[], &[], 2).unwrap();
    assert!(acc.schema().field("late").is_none());
    assert_eq!(acc.documents_inspected(), 2);

    // depth 0 inspects the whole batch
    acc.evolve(&batch, &[], &[], 0).unwrap();
    assert!(acc.schema().field("late").is_some());
}

#[test]
fn serialization_is_deterministic() {
    let docs = raw(&[json!({
        "id": 1,
        "created": "2024-01-01T10:00:00+02:00",
        "nested": {"z": [1.5], "a": {"deep": "x"}}
    })]);

    let mut one = accumulator("t");
    let mut two = accumulator("t");
    let a = one.evolve(&docs, &keys(&["id"]), &keys(&["id"]), 0).unwrap();
    let b = two.evolve(&docs, &keys(&["id"]), &keys(&["id"]), 0).unwrap();

    assert_eq!(a.schema_bytes(), b.schema_bytes());
    assert_eq!(
        one.schema().to_bytes().unwrap(),
        two.schema().to_bytes().unwrap()
    );

    let reparsed = Schema::from_slice(one.snapshot().unwrap()).unwrap();
    assert_eq!(&reparsed, one.schema());
}

#[test]
fn conflict_keeps_previous_snapshot() {
    let mut acc = accumulator("t");
    acc.evolve(&raw(&[json!({"a": "text"})]), &[], &[], 0)
        .unwrap();
    let before = acc.snapshot().unwrap().to_vec();

    let err = acc
        .evolve(&raw(&[json!({"a": {"nested": 1}})]), &[], &[], 0)
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(acc.snapshot().unwrap(), before.as_slice());
}

#[test]
fn coerce_policy_turns_conflicts_into_strings() {
    let mut acc = SchemaAccumulator::new(
        "t",
        DetectorConfig::default(),
        ConflictPolicy::CoerceToString,
    );
    acc.evolve(&raw(&[json!({"a": true})]), &[], &[], 0).unwrap();
    let outcome = acc
        .evolve(&raw(&[json!({"a": 12})]), &[], &[], 0)
        .unwrap();

    assert!(outcome.is_changed());
    assert_eq!(
        acc.schema().field("a").unwrap().field_type.kind,
        TypeKind::String
    );
}

#[test]
fn seeded_schema_widens_from_store() {
    let stored = br#"{"title":"old","properties":{"id":{"type":"integer","format":"int64"}},"primary_key":["id"]}"#;

    let mut acc = accumulator("orders");
    acc.seed(stored).unwrap();
    assert_eq!(acc.schema().collection_name, "orders");
    assert!(acc.schema().field("id").unwrap().is_primary_key);

    let outcome = acc
        .evolve(&raw(&[json!({"id": 1, "total": 9.5})]), &[], &[], 0)
        .unwrap();
    assert!(outcome.is_changed());

    let total = &acc.schema().field("total").unwrap().field_type;
    assert_eq!(total, &FieldType::new(TypeKind::Float64).into_nullable());
    assert_eq!(acc.schema().primary_key, keys(&["id"]));
}
