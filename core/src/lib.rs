//! # mdxdb core
//!
//! Shared vocabulary for every mdxdb backend:
//!
//! - **Documents**: [`Document`] with its `data` payload and tracking metadata
//! - **Filters**: [`Filter`] trees parsed from the `{ "path": { "$op": .. } }` form
//! - **Search**: [`VectorSearchOptions`] and ranked [`SearchResult`]s
//! - **Contracts**: [`DatabaseProvider`], [`CollectionProvider`], [`EmbeddingStore`]
//! - **Versioning**: merge-on-read folding of append-only rows
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  DatabaseProvider ──► CollectionProvider ──► SearchResult       │
//! │                              │                                  │
//! │              ┌───────────────┼───────────────┐                  │
//! │              ▼               ▼               ▼                  │
//! │      EmbeddingProvider  EmbeddingStore   Filter                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod document;
pub mod embedding_store;
pub mod error;
pub mod filter;
pub mod namespace;
pub mod provider;
pub mod search;
pub mod versioned;

pub use document::{Document, DocumentData, DocumentMetadata, content_hash};
pub use embedding_store::{EmbeddingStore, StoredEmbedding};
pub use error::{MdxdbError, Result};
pub use filter::{Filter, Operator, Predicate};
pub use namespace::derive_namespace;
pub use provider::{CollectionProvider, DatabaseProvider};
pub use search::{
    DEFAULT_LIMIT, DEFAULT_THRESHOLD, SearchOptions, SearchResult, VectorSearchOptions,
};
pub use versioned::{Collapsed, Versioned, collapse, collapse_latest};

// Re-export from dependencies for convenience
pub use mdxdb_embeddings::{Embedding, EmbeddingProvider};
