//! Embedding cache for callers that want to avoid repeat provider calls.
//!
//! Providers never cache on their own; wrap one in [`CachedProvider`] to
//! memoise vectors by `(text, model, dimensions)`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the text, model and dimensions that produced this vector.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// When the entry was created, in epoch milliseconds.
    pub created_at: i64,
}

/// Bounded map of computed embeddings with optional JSON persistence.
pub struct EmbeddingCache {
    cache: RwLock<HashMap<String, CacheEntry>>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Serialises snapshot, write and rename of the cache file.
    write_lock: Mutex<()>,

    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            cache_path: None,
            write_lock: Mutex::new(()),
            max_entries,
        }
    }

    /// Create a cache backed by a JSON file, loading it if present.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let cache = Self {
            cache: RwLock::new(HashMap::new()),
            cache_path: Some(path.as_ref().to_path_buf()),
            write_lock: Mutex::new(()),
            max_entries,
        };
        cache.load().await?;
        Ok(cache)
    }

    fn hash_key(text: &str, model: &str, dimensions: Option<usize>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(dimensions.unwrap_or_default().to_le_bytes());
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str, dimensions: Option<usize>) -> Option<Embedding> {
        let key = Self::hash_key(text, model, dimensions);
        let cache = self.cache.read().await;
        cache.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(
        &self,
        text: &str,
        model: &str,
        dimensions: Option<usize>,
        embedding: Embedding,
    ) -> Result<()> {
        let key = Self::hash_key(text, model, dimensions);
        let entry = CacheEntry {
            key: key.clone(),
            embedding,
            model: model.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        {
            let mut cache = self.cache.write().await;

            if cache.len() >= self.max_entries && !cache.contains_key(&key) {
                let oldest_key = cache
                    .iter()
                    .min_by_key(|(_, v)| v.created_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest_key) = oldest_key {
                    cache.remove(&oldest_key);
                }
            }

            cache.insert(key, entry);
        }
        debug!("Cached embedding (model: {model})");

        self.save().await
    }

    /// Number of cached vectors.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Clear the entire cache.
    pub async fn clear(&self) -> Result<()> {
        self.cache.write().await.clear();
        info!("Cleared embedding cache");
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;

        let content = {
            let cache = self.cache.read().await;
            let entries: Vec<&CacheEntry> = cache.values().collect();
            serde_json::to_string(&entries)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        if !fs::try_exists(path).await? {
            return Ok(());
        }

        let content = fs::read_to_string(path).await?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content)?;

        let mut cache = self.cache.write().await;
        for entry in entries {
            cache.insert(entry.key.clone(), entry);
        }

        info!("Loaded {} cache entries from disk", cache.len());
        Ok(())
    }
}

/// A provider wrapper that serves repeated requests from an [`EmbeddingCache`].
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn default_dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());

        if let Some(embedding) = self.cache.get(&request.text, &model, request.dimensions).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model,
                tokens_used: None,
            });
        }

        let response = self.provider.embed(request.clone()).await?;
        if let Err(e) = self
            .cache
            .put(
                &request.text,
                &model,
                request.dimensions,
                response.embedding.clone(),
            )
            .await
        {
            warn!("Failed to persist embedding cache: {e}");
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn default_model(&self) -> &str {
            "count-1"
        }

        fn default_dimension(&self) -> usize {
            2
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            Ok(EmbeddingResponse {
                embedding: vec![n, request.text.len() as f64],
                model: "count-1".to_string(),
                dimension: 2,
                tokens_used: None,
            })
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache
            .put("hello", "model-1", None, embedding.clone())
            .await
            .unwrap();

        assert_eq!(cache.get("hello", "model-1", None).await, Some(embedding));
        assert_eq!(cache.get("hello", "model-2", None).await, None);
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", None, vec![1.0]).await.unwrap();
        cache.put("b", "model", None, vec![2.0]).await.unwrap();
        cache.put("c", "model", None, vec![3.0]).await.unwrap();

        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_cached_provider_calls_upstream_once() {
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            EmbeddingCache::new(10),
        );

        let first = provider.generate_embedding("same text").await.unwrap();
        let second = provider.generate_embedding("same text").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache/embeddings.json");

        {
            let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
            cache.put("kept", "m", Some(2), vec![0.5, 0.5]).await.unwrap();
        }

        let reloaded = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        assert_eq!(reloaded.get("kept", "m", Some(2)).await, Some(vec![0.5, 0.5]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("embeddings.json");
        let cache = Arc::new(EmbeddingCache::with_persistence(&path, 100).await.unwrap());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache
                        .put(&format!("text-{i}"), "m", None, vec![i as f64])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reloaded = EmbeddingCache::with_persistence(&path, 100).await.unwrap();
        assert_eq!(reloaded.len().await, 64);
        assert_eq!(reloaded.get("text-7", "m", None).await, Some(vec![7.0]));
    }

    #[tokio::test]
    async fn test_unwritable_cache_does_not_fail_embed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache/embeddings.json");
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            EmbeddingCache::with_persistence(&path, 10).await.unwrap(),
        );

        // A plain file where the cache directory should be
        std::fs::write(temp_dir.path().join("cache"), "not a directory").unwrap();

        let embedding = provider.generate_embedding("text").await.unwrap();
        assert_eq!(embedding, vec![0.0, 4.0]);
        assert_eq!(
            provider.cache().get("text", "count-1", Some(2)).await,
            Some(vec![0.0, 4.0])
        );
    }
}
