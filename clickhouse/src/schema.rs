//! Schema bootstrap and engine version checks.
//!
//! ```text
//! <db>.data          VersionedCollapsingMergeTree(sign, version)
//!   │                append-only; update/delete write sign = -1 rows
//!   ▼
//! <db>.data_latest   VIEW over `data FINAL WHERE sign = 1`
//! ```

use mdxdb_core::{MdxdbError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::ColumnarEngine;

/// Oldest supported server release.
pub const MIN_VERSION: (u32, u32) = (24, 10);

/// Append-only table holding every row ever written.
pub const DATA_TABLE: &str = "data";

/// View exposing only the surviving row of each document.
pub const LATEST_VIEW: &str = "data_latest";

/// Vector index declared on the `embedding` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(rename = "type")]
    pub index_type: String,
    pub metric: String,
    pub dimensions: usize,
}

impl VectorIndexConfig {
    /// HNSW with cosine distance.
    pub fn hnsw(dimensions: usize) -> Self {
        Self {
            index_type: "hnsw".to_string(),
            metric: "cosineDistance".to_string(),
            dimensions,
        }
    }
}

/// Reject identifiers that cannot be interpolated into DDL unquoted.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MdxdbError::Configuration(format!(
            "invalid ClickHouse identifier: {name:?}"
        )))
    }
}

/// Idempotent DDL creating the database, table and view.
pub fn bootstrap_statements(database: &str, index: &VectorIndexConfig) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {database}.{DATA_TABLE}
(
    id String,
    ns String,
    type LowCardinality(String),
    path Array(String),
    data JSON,
    content String,
    embedding Array(Float32),
    ts DateTime64(3, 'UTC'),
    hash String,
    version UInt64,
    sign Int8,
    INDEX embedding_index embedding TYPE vector_similarity('{}', '{}', {})
)
ENGINE = VersionedCollapsingMergeTree(sign, version)
ORDER BY (ns, type, id)",
            index.index_type, index.metric, index.dimensions
        ),
        format!(
            "CREATE VIEW IF NOT EXISTS {database}.{LATEST_VIEW} AS
SELECT * FROM {database}.{DATA_TABLE} FINAL WHERE sign = 1"
        ),
    ]
}

/// Run the bootstrap DDL.
pub async fn bootstrap(
    engine: &dyn ColumnarEngine,
    database: &str,
    index: &VectorIndexConfig,
) -> Result<()> {
    validate_identifier(database)?;
    for statement in bootstrap_statements(database, index) {
        engine.exec(&statement).await?;
    }
    debug!("Bootstrapped ClickHouse schema in {database}");
    Ok(())
}

/// Leading `major.minor` of a version string.
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Fail unless the server is at least [`MIN_VERSION`].
pub async fn check_version(engine: &dyn ColumnarEngine) -> Result<String> {
    let version = engine.version().await?;
    match parse_version(&version) {
        Some(found) if found >= MIN_VERSION => {
            info!("Connected to ClickHouse {version}");
            Ok(version)
        }
        _ => Err(MdxdbError::UnsupportedEngineVersion(format!(
            "ClickHouse version {}.{} or higher is required (found {version})",
            MIN_VERSION.0, MIN_VERSION.1
        ))),
    }
}
