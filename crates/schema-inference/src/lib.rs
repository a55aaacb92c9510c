//! Schema Inference - structural schemas from batches of JSON documents.
//!
//! Documents arrive in batches for one collection. Each batch is folded into
//! a running schema that only ever widens: new fields are added as nullable,
//! `int64` meets `float64` as `float64`, and nested objects and arrays are
//! merged field by field. The serialized schema is compared byte for byte
//! with the previous snapshot so callers only push a schema when it changed.
//!
//! # Features
//!
//! - **Value classification**: integers, floats, UUIDs, RFC 3339 date-times
//!   and base64 byte arrays, each detector switchable
//! - **Structural building**: nested objects and arrays in first-seen order
//! - **Merging**: commutative widening with explicit conflicts
//! - **Change detection**: deterministic bytes and fingerprints
//!
//! # Example
//!
//! ```ignore
//! use schema_inference::{ConflictPolicy, DetectorConfig, SchemaAccumulator};
//!
//! let mut acc = SchemaAccumulator::new(
//!     "users",
//!     DetectorConfig::default(),
//!     ConflictPolicy::Fail,
//! );
//!
//! let batch = [br#"{"id": 1, "name": "Alice"}"#.as_slice()];
//! let outcome = acc.evolve(&batch, &["id".into()], &[], 0)?;
//! if let Some(bytes) = outcome.schema_bytes() {
//!     store.create_or_update_collection("users", bytes).await?;
//! }
//! ```

mod accumulator;
mod builder;
mod classifier;
mod errors;
mod field_type;
mod fingerprint;
mod merge;
mod schema;
mod wire;

pub use accumulator::{EvolveOutcome, SchemaAccumulator, SchemaVersion};
pub use builder::{TypeBuilder, build_type};
pub use classifier::classify;
pub use errors::{InferenceError, InferenceResult};
pub use field_type::{FieldType, TypeKind};
pub use fingerprint::{compute_fingerprint, compute_short_fingerprint};
pub use merge::merge;
pub use schema::{Schema, SchemaField};

pub use docport_config::{ConflictPolicy, DetectorConfig};
