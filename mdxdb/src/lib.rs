//! # mdxdb
//!
//! A document database with embedding storage and similarity search behind
//! one contract, with three interchangeable backends:
//!
//! - **Filesystem**: MDX files plus a JSON embedding sidecar, searched in process
//! - **ClickHouse**: append-only versioned rows, searched with `cosineDistance`
//! - **Fetch**: every operation delegated to a remote mdxdb service
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                MdxdbConfig ──► connect()                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │ FsDatabase   │  │ ClickHouse   │  │ Fetch        │           │
//! │  │              │  │ Database     │  │ Database     │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                 dyn DatabaseProvider                            │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                 dyn CollectionProvider                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mdxdb::{MdxdbConfig, VectorSearchOptions, connect};
//!
//! let db = connect(MdxdbConfig::from_env()?).await?;
//! let posts = db.collection("posts").await?;
//!
//! let results = posts
//!     .vector_search(VectorSearchOptions::new(query).with_threshold(0.8))
//!     .await?;
//! ```

pub mod config;
pub mod connect;

pub use config::{BackendConfig, CacheMode, EmbeddingConfig, MdxdbConfig};
pub use connect::{connect, embedder, open};

// Re-export from dependencies for convenience
pub use mdxdb_clickhouse::{ClickHouseConfig, ClickHouseDatabase};
pub use mdxdb_core::{
    CollectionProvider, DatabaseProvider, Document, Filter, MdxdbError, Result, SearchOptions,
    SearchResult, VectorSearchOptions,
};
pub use mdxdb_embeddings::{Embedding, EmbeddingProvider};
pub use mdxdb_fetch::{FetchConfig, FetchDatabase};
pub use mdxdb_fs::{FsConfig, FsDatabase};
