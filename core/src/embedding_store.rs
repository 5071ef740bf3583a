//! Durable document-to-vector storage.

use async_trait::async_trait;
use mdxdb_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The embedding recorded for one document.
///
/// Always replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    /// Document identifier.
    pub id: String,

    /// Content the vector was computed from.
    pub content: String,

    pub embedding: Embedding,

    /// Write time in epoch milliseconds.
    pub timestamp: i64,
}

/// Mapping from document identifier to its [`StoredEmbedding`].
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert or replace the embedding for `id`.
    async fn store_embedding(&self, id: &str, content: &str, embedding: &[f64]) -> Result<()>;

    /// `None` when nothing is stored for `id`.
    async fn get_embedding(&self, id: &str) -> Result<Option<StoredEmbedding>>;

    /// Every stored embedding, in no particular order.
    async fn get_all_embeddings(&self) -> Result<Vec<StoredEmbedding>>;

    /// Remove the embedding for `id`; a no-op when absent.
    async fn delete_embedding(&self, id: &str) -> Result<()>;
}
