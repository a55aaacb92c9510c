//! Docport Core Types
//!
//! This crate defines the document wrapper, the store trait the import loop
//! talks to, and the store error type with its retry-relevant kind.

use std::sync::Arc;

use async_trait::async_trait;

mod document;
pub mod errors;

pub use document::{Document, cleanup_batch};
pub use errors::{StoreError, StoreErrorKind, StoreResult};

// ============================================================================
// Document Store
// ============================================================================

/// A document database that holds named collections with a schema each.
///
/// Schemas travel as the serialized wire bytes produced by the inference
/// engine; a store may keep them verbatim or translate them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stored schema of `collection`, or `None` if it does not exist.
    async fn describe_collection(
        &self,
        collection: &str,
    ) -> StoreResult<Option<Vec<u8>>>;

    /// Create `collection` or replace its schema.
    async fn create_or_update_collection(
        &self,
        collection: &str,
        schema: &[u8],
    ) -> StoreResult<()>;

    /// Insert a batch and return how many documents were written.
    ///
    /// A batch is all or nothing: on error, nothing from it is stored.
    async fn insert(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> StoreResult<usize>;
}

pub type ArcDynStore = Arc<dyn DocumentStore>;

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn describe_collection(
        &self,
        collection: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        (**self).describe_collection(collection).await
    }

    async fn create_or_update_collection(
        &self,
        collection: &str,
        schema: &[u8],
    ) -> StoreResult<()> {
        (**self).create_or_update_collection(collection, schema).await
    }

    async fn insert(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> StoreResult<usize> {
        (**self).insert(collection, documents).await
    }
}
