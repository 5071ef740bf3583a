//! Filesystem database provider.

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{
    CollectionProvider, DatabaseProvider, EmbeddingProvider, EmbeddingStore, MdxdbError, Result,
};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::collection::FsCollection;
use crate::config::FsConfig;
use crate::content::{ContentStore, FsContentStore};
use crate::embeddings::SidecarEmbeddingStore;

/// A namespace rooted at a local directory.
///
/// All collections share one content store and one sidecar embedding
/// store, so sidecar writes from this database never interleave.
pub struct FsDatabase {
    config: FsConfig,
    namespace: String,
    content: Arc<FsContentStore>,
    embeddings: Arc<SidecarEmbeddingStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Arc<FsCollection>>>,
}

impl FsDatabase {
    pub fn new(config: FsConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            namespace: config.namespace(),
            content: Arc::new(FsContentStore::new(&config.root)),
            embeddings: Arc::new(SidecarEmbeddingStore::new(&config.root)),
            embedder,
            collections: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The sidecar store shared by every collection.
    pub fn embedding_store(&self) -> Arc<SidecarEmbeddingStore> {
        Arc::clone(&self.embeddings)
    }

    async fn collection_dirs(&self) -> Result<Vec<String>> {
        let root = &self.config.root;
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MdxdbError::storage_io("list", root.display(), e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MdxdbError::storage_io("list", root.display(), e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| MdxdbError::storage_io("list", entry.path().display(), e))?
                .is_dir();
            if is_dir {
                names.push(name);
            }
        }
        Ok(names)
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(MdxdbError::Configuration(format!(
            "invalid collection name: {name:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl DatabaseProvider for FsDatabase {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn connect(&self) -> Result<()> {
        let root = &self.config.root;
        fs::create_dir_all(root)
            .await
            .map_err(|e| MdxdbError::storage_io("create directory", root.display(), e))?;
        info!("Opened filesystem database {} at {}", self.namespace, root.display());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.collections.write().await.clear();
        info!("Closed filesystem database {}", self.namespace);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.collection_dirs().await?.into_iter().collect();
        names.extend(self.collections.read().await.keys().cloned());
        Ok(names.into_iter().collect())
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionProvider>> {
        validate_collection_name(name)?;

        if let Some(collection) = self.collections.read().await.get(name) {
            return Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>);
        }

        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            debug!("Opening collection {name} in {}", self.namespace);
            Arc::new(
                FsCollection::new(
                    name,
                    Arc::clone(&self.content) as Arc<dyn ContentStore>,
                    Arc::clone(&self.embeddings) as Arc<dyn EmbeddingStore>,
                    Arc::clone(&self.embedder),
                )
                .with_namespace(&self.namespace)
                .with_dimensions(self.config.dimensions),
            )
        });
        Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>)
    }
}
