use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use docport_core::{Document, DocumentStore, StoreError, StoreResult};

use crate::validate::{parse_schema, validate_batch};

#[derive(Default)]
struct MemCollection {
    schema: Vec<u8>,
    documents: Vec<Document>,
}

/// In-memory store that enforces collection schemas like a real database.
#[derive(Default)]
pub struct MemDocumentStore {
    map: RwLock<HashMap<String, MemCollection>>,
}

impl MemDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents stored in `collection`, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.map
            .read()
            .await
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    pub async fn collections(&self) -> Vec<String> {
        self.map.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemDocumentStore {
    async fn describe_collection(
        &self,
        collection: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let map = self.map.read().await;
        Ok(map.get(collection).map(|c| c.schema.clone()))
    }

    async fn create_or_update_collection(
        &self,
        collection: &str,
        schema: &[u8],
    ) -> StoreResult<()> {
        parse_schema(collection, schema)?;
        let mut map = self.map.write().await;
        let entry = map.entry(collection.to_string()).or_default();
        entry.schema = schema.to_vec();
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> StoreResult<usize> {
        let mut map = self.map.write().await;
        let Some(entry) = map.get_mut(collection) else {
            return Err(StoreError::not_found(format!(
                "collection '{collection}' does not exist"
            )));
        };

        let schema = parse_schema(collection, &entry.schema)?;
        validate_batch(&schema, documents)?;
        entry.documents.extend_from_slice(documents);
        Ok(documents.len())
    }
}
