//! # Embeddings
//!
//! Embedding generation and cosine similarity for mdxdb.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to fixed-width vectors
//! - **Similarity**: Degenerate-safe cosine similarity and ranking
//! - **Caching**: Optional memoisation wrapper around any provider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► cosine_similarity ──► rank │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  OpenAIProvider / CachedProvider                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use similarity::{cosine_distance, cosine_similarity, rank};

/// A dense vector embedding.
pub type Embedding = Vec<f64>;

/// Width of generated embeddings unless configured otherwise.
pub const DEFAULT_DIMENSION: usize = 256;

/// Model requested from the upstream provider unless configured otherwise.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
