//! Sidecar embedding storage.
//!
//! All embeddings of a namespace root live in one JSON file,
//! `<root>/.mdxdb/embeddings.json`. Every mutation loads the whole file,
//! changes one entry and writes the whole file back through a temp file
//! and a rename. A missing file is an empty store.
//!
//! Writers sharing one [`SidecarEmbeddingStore`] are serialised. Separate
//! instances or processes pointed at the same root are not, and the last
//! write wins.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mdxdb_core::{EmbeddingStore, MdxdbError, Result, StoredEmbedding};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Hidden directory holding derived data under a namespace root.
pub const SIDECAR_DIR: &str = ".mdxdb";

/// File name of the embeddings sidecar.
pub const EMBEDDINGS_FILE: &str = "embeddings.json";

/// Format version written to and accepted from the sidecar.
pub const STORAGE_VERSION: &str = "1";

/// On-disk shape of the sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsStorage {
    pub version: String,
    pub embeddings: BTreeMap<String, StoredEmbedding>,
}

impl Default for EmbeddingsStorage {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            embeddings: BTreeMap::new(),
        }
    }
}

/// [`EmbeddingStore`] backed by a single JSON file.
pub struct SidecarEmbeddingStore {
    path: PathBuf,

    /// Held across each read-modify-write cycle.
    write_lock: Mutex<()>,
}

impl SidecarEmbeddingStore {
    /// Store for the namespace rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(SIDECAR_DIR).join(EMBEDDINGS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the sidecar file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole sidecar.
    pub async fn load(&self) -> Result<EmbeddingsStorage> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EmbeddingsStorage::default()),
            Err(e) => return Err(MdxdbError::storage_io("read", self.path.display(), e)),
        };

        let storage: EmbeddingsStorage =
            serde_json::from_str(&content).map_err(|e| MdxdbError::CorruptStorage {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        if storage.version != STORAGE_VERSION {
            return Err(MdxdbError::CorruptStorage {
                path: self.path.display().to_string(),
                message: format!("unsupported storage version {}", storage.version),
            });
        }

        Ok(storage)
    }

    async fn save(&self, storage: &EmbeddingsStorage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MdxdbError::storage_io("create directory", parent.display(), e))?;
        }

        let content = serde_json::to_string_pretty(storage)?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| MdxdbError::storage_io("write", temp_path.display(), e))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| MdxdbError::storage_io("rename", self.path.display(), e))?;

        Ok(())
    }
}

#[async_trait]
impl EmbeddingStore for SidecarEmbeddingStore {
    async fn store_embedding(&self, id: &str, content: &str, embedding: &[f64]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut storage = self.load().await?;
        storage.embeddings.insert(
            id.to_string(),
            StoredEmbedding {
                id: id.to_string(),
                content: content.to_string(),
                embedding: embedding.to_vec(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        self.save(&storage).await?;

        debug!("Stored embedding for {id} ({} dimensions)", embedding.len());
        Ok(())
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<StoredEmbedding>> {
        Ok(self.load().await?.embeddings.remove(id))
    }

    async fn get_all_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        Ok(self.load().await?.embeddings.into_values().collect())
    }

    async fn delete_embedding(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut storage = self.load().await?;
        if storage.embeddings.remove(id).is_some() {
            self.save(&storage).await?;
            debug!("Deleted embedding for {id}");
        }
        Ok(())
    }
}
