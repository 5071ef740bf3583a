//! # mdxdb ClickHouse backend
//!
//! Documents of every collection share one append-only table. Similarity
//! search runs in SQL with `cosineDistance` over an HNSW index, and scores
//! are reported as `1 - distance`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ClickHouseDatabase ──► ClickHouseCollection                    │
//! │          │                     │                                │
//! │          │            query builders ──► ColumnarEngine         │
//! │          ▼                     │               │                │
//! │   schema bootstrap     normalize_rows ◄── HttpEngine (HTTP)     │
//! │   + version check              │                                │
//! │                        Row ──► Versioned ──► collapse           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod collection;
pub mod config;
pub mod database;
pub mod engine;
pub mod query;
pub mod response;
pub mod row;
pub mod schema;

#[cfg(test)]
mod testing;

pub use collection::ClickHouseCollection;
pub use config::ClickHouseConfig;
pub use database::ClickHouseDatabase;
pub use engine::{ColumnarEngine, HttpEngine};
pub use response::normalize_rows;
pub use schema::{VectorIndexConfig, bootstrap, check_version};
