//! Schema accumulator and change detection.
//!
//! One [`SchemaAccumulator`] owns the running schema of one collection for
//! the length of an import session. Each [`evolve`](SchemaAccumulator::evolve)
//! call folds a batch into a working copy, serializes it, and only commits
//! when the bytes differ from the last snapshot. A failed batch leaves the
//! committed state exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace};

use docport_config::{ConflictPolicy, DetectorConfig};

use crate::builder::TypeBuilder;
use crate::errors::{InferenceError, InferenceResult};
use crate::fingerprint::compute_fingerprint;
use crate::schema::Schema;

/// Result of evolving the schema with one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolveOutcome {
    /// First snapshot for this collection
    NewSchema {
        schema: Vec<u8>,
        fingerprint: String,
        sequence: u64,
    },

    /// Schema changed from the last snapshot
    Evolved {
        schema: Vec<u8>,
        old_fingerprint: String,
        new_fingerprint: String,
        old_sequence: u64,
        new_sequence: u64,
    },

    /// Serialized schema is byte-identical to the last snapshot
    Unchanged { fingerprint: String, sequence: u64 },
}

impl EvolveOutcome {
    /// Whether the caller has to push a new schema.
    pub fn is_changed(&self) -> bool {
        !matches!(self, EvolveOutcome::Unchanged { .. })
    }

    /// Serialized schema to push, if it changed.
    pub fn schema_bytes(&self) -> Option<&[u8]> {
        match self {
            EvolveOutcome::NewSchema { schema, .. }
            | EvolveOutcome::Evolved { schema, .. } => Some(schema),
            EvolveOutcome::Unchanged { .. } => None,
        }
    }

    pub fn fingerprint(&self) -> &str {
        match self {
            EvolveOutcome::NewSchema { fingerprint, .. }
            | EvolveOutcome::Unchanged { fingerprint, .. } => fingerprint,
            EvolveOutcome::Evolved {
                new_fingerprint, ..
            } => new_fingerprint,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            EvolveOutcome::NewSchema { sequence, .. }
            | EvolveOutcome::Unchanged { sequence, .. } => *sequence,
            EvolveOutcome::Evolved { new_sequence, .. } => *new_sequence,
        }
    }
}

/// Schema version information for logs and reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaVersion {
    /// Fingerprint of the snapshot bytes
    pub fingerprint: String,

    /// Monotonic sequence number, bumped on every committed change
    pub sequence: u64,

    /// When the current snapshot was committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<DateTime<Utc>>,
}

/// Running schema of one collection.
///
/// Batches of one stream are evolved in arrival order through `&mut self`.
#[derive(Debug, Clone)]
pub struct SchemaAccumulator {
    detect: DetectorConfig,
    policy: ConflictPolicy,

    schema: Schema,

    /// Last committed serialized schema
    snapshot: Option<Vec<u8>>,
    fingerprint: String,
    sequence: u64,

    batches: u64,
    documents_inspected: u64,
    last_changed: Option<DateTime<Utc>>,
}

impl SchemaAccumulator {
    pub fn new(
        collection: impl Into<String>,
        detect: DetectorConfig,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            detect,
            policy,
            schema: Schema::new(collection),
            snapshot: None,
            fingerprint: String::new(),
            sequence: 0,
            batches: 0,
            documents_inspected: 0,
            last_changed: None,
        }
    }

    /// Start from a schema that already exists in the store.
    ///
    /// The seeded schema becomes the committed snapshot, so a batch with no
    /// new structure reports `Unchanged`.
    pub fn seed(&mut self, schema_bytes: &[u8]) -> InferenceResult<()> {
        let mut schema = Schema::from_slice(schema_bytes)?;
        schema.collection_name = self.schema.collection_name.clone();
        let snapshot = schema.to_bytes()?;

        info!(
            collection = %schema.collection_name,
            fields = schema.fields.len(),
            "seeded schema from store"
        );

        self.commit(schema, snapshot);
        Ok(())
    }

    /// Evolve with a batch of raw JSON documents.
    ///
    /// Only the first `inference_depth` documents are parsed and inspected
    /// (zero inspects the whole batch).
    pub fn evolve<D: AsRef<[u8]>>(
        &mut self,
        documents: &[D],
        primary_key: &[String],
        autogenerate: &[String],
        inference_depth: usize,
    ) -> InferenceResult<EvolveOutcome> {
        let depth = depth_bound(documents.len(), inference_depth);
        let inspected = &documents[..depth];

        let mut parsed = Vec::with_capacity(inspected.len());
        for (index, doc) in inspected.iter().enumerate() {
            let value: Value =
                serde_json::from_slice(doc.as_ref()).map_err(|source| {
                    InferenceError::JsonParse { index, source }
                })?;
            parsed.push(value);
        }

        self.evolve_inspected(&parsed, primary_key, autogenerate)
    }

    /// Evolve with a batch of already parsed documents.
    pub fn evolve_values(
        &mut self,
        documents: &[Value],
        primary_key: &[String],
        autogenerate: &[String],
        inference_depth: usize,
    ) -> InferenceResult<EvolveOutcome> {
        let depth = depth_bound(documents.len(), inference_depth);
        let inspected = &documents[..depth];
        self.evolve_inspected(inspected, primary_key, autogenerate)
    }

    fn evolve_inspected(
        &mut self,
        inspected: &[Value],
        primary_key: &[String],
        autogenerate: &[String],
    ) -> InferenceResult<EvolveOutcome> {
        let builder = TypeBuilder::new(&self.detect, self.policy);
        let batch = builder.infer_batch(inspected)?;

        let mut next = self.schema.clone();
        if let Some(fields) = batch {
            next.absorb(fields, self.policy)?;
        }
        next.annotate(primary_key, autogenerate);
        let bytes = next.to_bytes()?;

        self.batches += 1;
        self.documents_inspected += inspected.len() as u64;

        if self.snapshot.as_deref() == Some(bytes.as_slice()) {
            trace!(
                collection = %self.schema.collection_name,
                inspected = inspected.len(),
                "schema unchanged"
            );
            return Ok(EvolveOutcome::Unchanged {
                fingerprint: self.fingerprint.clone(),
                sequence: self.sequence,
            });
        }

        let first = self.snapshot.is_none();
        let old_fingerprint = self.fingerprint.clone();
        let old_sequence = self.sequence;
        self.commit(next, bytes.clone());

        if first {
            info!(
                collection = %self.schema.collection_name,
                fingerprint = %self.fingerprint,
                fields = self.schema.fields.len(),
                "new schema inferred"
            );
            Ok(EvolveOutcome::NewSchema {
                schema: bytes,
                fingerprint: self.fingerprint.clone(),
                sequence: self.sequence,
            })
        } else {
            debug!(
                collection = %self.schema.collection_name,
                old_fp = %old_fingerprint,
                new_fp = %self.fingerprint,
                sequence = self.sequence,
                "schema evolved"
            );
            Ok(EvolveOutcome::Evolved {
                schema: bytes,
                old_fingerprint,
                new_fingerprint: self.fingerprint.clone(),
                old_sequence,
                new_sequence: self.sequence,
            })
        }
    }

    fn commit(&mut self, schema: Schema, snapshot: Vec<u8>) {
        self.fingerprint = compute_fingerprint(&snapshot);
        self.sequence += 1;
        self.schema = schema;
        self.snapshot = Some(snapshot);
        self.last_changed = Some(Utc::now());
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Last committed snapshot bytes.
    pub fn snapshot(&self) -> Option<&[u8]> {
        self.snapshot.as_deref()
    }

    pub fn version(&self) -> Option<SchemaVersion> {
        self.snapshot.as_ref().map(|_| SchemaVersion {
            fingerprint: self.fingerprint.clone(),
            sequence: self.sequence,
            changed_at: self.last_changed,
        })
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn documents_inspected(&self) -> u64 {
        self.documents_inspected
    }

}

fn depth_bound(len: usize, inference_depth: usize) -> usize {
    if inference_depth == 0 {
        len
    } else {
        inference_depth.min(len)
    }
}
