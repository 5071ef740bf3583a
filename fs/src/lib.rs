//! # mdxdb filesystem backend
//!
//! Stores a namespace as a directory tree:
//!
//! ```text
//! <root>/
//! ├── .mdxdb/
//! │   └── embeddings.json      one sidecar for every collection
//! ├── posts/
//! │   ├── hello-world.mdx      YAML frontmatter + content
//! │   └── https%3A%2F%2Fexample.com%2Fa.mdx
//! └── notes/
//! ```
//!
//! Similarity search loads the sidecar and scores every document of the
//! collection in process.

pub mod collection;
pub mod config;
pub mod content;
pub mod database;
pub mod embeddings;
pub mod format;

pub use collection::{FsCollection, embedding_key};
pub use config::FsConfig;
pub use content::{ContentStore, FsContentStore};
pub use database::FsDatabase;
pub use embeddings::{EmbeddingsStorage, SidecarEmbeddingStore};
