//! Batch import loop with schema evolution and a single retry.
//!
//! One [`ImportSession`] imports a stream of document batches into one
//! collection. Depending on the session mode each batch first evolves the
//! running schema (pushing it only when its bytes changed), then goes to the
//! store. An insert rejected as `NotFound` or `InvalidArgument` is answered
//! with one more evolution, an optional null cleanup and exactly one retry.

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docport_config::ImportConfig;
use docport_core::{
    ArcDynStore, Document, StoreError, StoreErrorKind, cleanup_batch,
};
use schema_inference::{
    InferenceError, SchemaAccumulator, SchemaVersion, compute_short_fingerprint,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(
        "collection '{collection}' already exists, use --append to add documents to it"
    )]
    CollectionExists { collection: String },

    #[error(
        "collection '{collection}' does not exist and creation is disabled"
    )]
    CollectionMissing { collection: String },

    #[error("schema inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("{stage}: {source}")]
    Store {
        stage: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("import cancelled")]
    Cancelled,
}

impl ImportError {
    fn store(stage: &'static str, source: StoreError) -> Self {
        ImportError::Store { stage, source }
    }
}

/// Totals for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub collection: String,
    pub batches: u64,
    pub documents: u64,
    pub schema_updates: u64,
    pub retries: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<SchemaVersion>,
}

pub struct ImportSession {
    store: ArcDynStore,
    collection: String,
    cfg: ImportConfig,
    accumulator: SchemaAccumulator,
    /// The collection existed when the session started.
    existed: bool,
    cancel: CancellationToken,
    summary: ImportSummary,
}

impl ImportSession {
    /// Describe the collection and decide whether the import may proceed.
    ///
    /// An existing collection needs `append`; its schema seeds the
    /// accumulator. A missing one needs creation to be allowed.
    pub async fn start(
        store: ArcDynStore,
        collection: impl Into<String>,
        cfg: ImportConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ImportError> {
        let collection = collection.into();
        let mut accumulator = SchemaAccumulator::new(
            collection.clone(),
            cfg.detect,
            cfg.on_conflict,
        );

        let existing = store
            .describe_collection(&collection)
            .await
            .map_err(|e| ImportError::store("describe collection", e))?;

        let existed = match existing {
            Some(schema) => {
                if !cfg.append {
                    return Err(ImportError::CollectionExists { collection });
                }
                accumulator.seed(&schema)?;
                true
            }
            None if cfg.no_create => {
                return Err(ImportError::CollectionMissing { collection });
            }
            None => false,
        };

        info!(
            collection = %collection,
            existed,
            update_schema = cfg.update_schema,
            batch_size = cfg.batch_size,
            "import session starting"
        );

        Ok(Self {
            store,
            summary: ImportSummary {
                collection: collection.clone(),
                ..Default::default()
            },
            collection,
            cfg,
            accumulator,
            existed,
            cancel,
        })
    }

    /// Whether every batch evolves the schema before it is inserted.
    pub fn evolves_every_batch(&self) -> bool {
        self.cfg.update_schema || (!self.existed && !self.cfg.no_create)
    }

    /// Whether the importer may change the schema at all, which is what
    /// the retry path needs.
    pub fn manages_schema(&self) -> bool {
        self.cfg.update_schema || !self.cfg.no_create
    }

    fn should_retry(&self, kind: StoreErrorKind) -> bool {
        let policy = &self.cfg.retry;
        if !policy.enabled || !self.manages_schema() {
            return false;
        }
        match kind {
            StoreErrorKind::NotFound => policy.on_not_found,
            StoreErrorKind::InvalidArgument => policy.on_invalid_argument,
            StoreErrorKind::Other => false,
        }
    }

    /// Consume batches until the channel closes or the token fires.
    pub async fn run(
        &mut self,
        mut rx: mpsc::Receiver<Vec<Document>>,
    ) -> Result<ImportSummary, ImportError> {
        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(ImportError::Cancelled);
                }
                next = rx.recv() => next,
            };

            match batch {
                Some(batch) => {
                    self.import_batch(batch).await?;
                }
                None => break,
            }
        }

        info!(
            collection = %self.collection,
            batches = self.summary.batches,
            documents = self.summary.documents,
            schema_updates = self.summary.schema_updates,
            retries = self.summary.retries,
            "import finished"
        );
        Ok(self.summary())
    }

    /// Import one batch and return the number of documents written.
    pub async fn import_batch(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<usize, ImportError> {
        if documents.is_empty() {
            return Ok(0);
        }

        counter!(
            "docport_batches_total",
            "collection" => self.collection.clone()
        )
        .increment(1);
        self.summary.batches += 1;

        match self.try_import(documents).await {
            Ok(written) => {
                counter!(
                    "docport_documents_imported_total",
                    "collection" => self.collection.clone()
                )
                .increment(written as u64);
                self.summary.documents += written as u64;
                Ok(written)
            }
            Err(e) => {
                counter!(
                    "docport_import_failures_total",
                    "collection" => self.collection.clone()
                )
                .increment(1);
                Err(e)
            }
        }
    }

    async fn try_import(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<usize, ImportError> {
        if self.evolves_every_batch() {
            self.evolve_and_push(&documents).await?;
        }

        let first = match self.insert(&documents).await? {
            Ok(written) => {
                debug!(
                    collection = %self.collection,
                    written,
                    "batch inserted"
                );
                return Ok(written);
            }
            Err(e) => e,
        };

        if !self.should_retry(first.kind()) {
            return Err(ImportError::store("import documents", first));
        }

        warn!(
            collection = %self.collection,
            kind = first.kind().as_str(),
            error = %first,
            "insert rejected, evolving schema and retrying once"
        );
        counter!(
            "docport_insert_retries_total",
            "collection" => self.collection.clone()
        )
        .increment(1);
        self.summary.retries += 1;

        self.evolve_and_push(&documents).await?;

        let documents = if self.cfg.cleanup_null_values {
            cleanup_batch(&documents)
        } else {
            documents
        };

        self.insert(&documents).await?.map_err(|e| {
            ImportError::store("import documents (after schema update)", e)
        })
    }

    /// Insert unless cancelled. The outer result carries cancellation, the
    /// inner one the store's answer.
    async fn insert(
        &self,
        documents: &[Document],
    ) -> Result<Result<usize, StoreError>, ImportError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ImportError::Cancelled),
            res = self.store.insert(&self.collection, documents) => Ok(res),
        }
    }

    /// Evolve with `documents` and push the schema if it changed.
    ///
    /// The accumulator only keeps the new snapshot once the store has
    /// accepted it, so a failed or cancelled push is retried on the next
    /// evolution.
    async fn evolve_and_push(
        &mut self,
        documents: &[Document],
    ) -> Result<(), ImportError> {
        let previous = self.accumulator.clone();
        let outcome = self.accumulator.evolve(
            documents,
            &self.cfg.primary_key,
            &self.cfg.autogenerate,
            self.cfg.inference_depth,
        )?;

        let Some(schema) = outcome.schema_bytes() else {
            return Ok(());
        };

        if let Err(e) = self.push_schema(schema).await {
            self.accumulator = previous;
            return Err(e);
        }

        counter!(
            "docport_schema_updates_total",
            "collection" => self.collection.clone()
        )
        .increment(1);
        self.summary.schema_updates += 1;

        info!(
            collection = %self.collection,
            fingerprint = %compute_short_fingerprint(schema),
            sequence = outcome.sequence(),
            "schema pushed"
        );
        Ok(())
    }

    async fn push_schema(&self, schema: &[u8]) -> Result<(), ImportError> {
        let push = self
            .store
            .create_or_update_collection(&self.collection, schema);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ImportError::Cancelled),
            res = push => res.map_err(|e| {
                ImportError::store("create or update collection", e)
            }),
        }
    }

    pub fn accumulator(&self) -> &SchemaAccumulator {
        &self.accumulator
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            schema_version: self.accumulator.version(),
            ..self.summary.clone()
        }
    }
}
