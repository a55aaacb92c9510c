use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use docport_core::{Document, DocumentStore, StoreError, StoreResult};

use crate::validate::{check_collection_name, parse_schema, validate_batch};

/// Directory-backed store.
///
/// Each collection is a pair of files: `<name>.schema.json` holding the
/// schema bytes as pushed, and `<name>.jsonl` with one document per line.
pub struct FileDocumentStore {
    dir: PathBuf,
    guard: Mutex<()>,
}

impl FileDocumentStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn schema_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.schema.json"))
    }

    fn data_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }

    async fn load_schema(
        &self,
        collection: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        let path = self.schema_path(collection);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read(&path).await?))
    }

    /// Documents stored in `collection`, one per line of the data file.
    pub async fn documents(
        &self,
        collection: &str,
    ) -> StoreResult<Vec<Document>> {
        check_collection_name(collection)?;
        let _g = self.guard.lock().await;
        let path = self.data_path(collection);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read(&path).await?;
        Ok(raw
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(Document::from_slice)
            .collect())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn describe_collection(
        &self,
        collection: &str,
    ) -> StoreResult<Option<Vec<u8>>> {
        check_collection_name(collection)?;
        let _g = self.guard.lock().await;
        self.load_schema(collection).await
    }

    async fn create_or_update_collection(
        &self,
        collection: &str,
        schema: &[u8],
    ) -> StoreResult<()> {
        check_collection_name(collection)?;
        parse_schema(collection, schema)?;

        let _g = self.guard.lock().await;
        let path = self.schema_path(collection);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, schema).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(collection, path = %path.display(), "schema written");
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> StoreResult<usize> {
        check_collection_name(collection)?;
        let _g = self.guard.lock().await;

        let Some(bytes) = self.load_schema(collection).await? else {
            return Err(StoreError::not_found(format!(
                "collection '{collection}' does not exist"
            )));
        };
        let schema = parse_schema(collection, &bytes)?;
        validate_batch(&schema, documents)?;

        let mut out = Vec::new();
        for doc in documents {
            push_line(&mut out, doc.as_bytes());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.data_path(collection))
            .await?;
        file.write_all(&out).await?;
        file.flush().await?;

        Ok(documents.len())
    }
}

/// Append `raw` as one line.
///
/// Valid JSON never holds a raw line break inside a string, so dropping
/// them leaves every value byte as it was.
fn push_line(out: &mut Vec<u8>, raw: &[u8]) {
    out.extend(
        raw.trim_ascii()
            .iter()
            .filter(|b| !matches!(b, b'\n' | b'\r')),
    );
    out.push(b'\n');
}
