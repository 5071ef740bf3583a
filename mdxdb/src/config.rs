//! Configuration for opening an mdxdb database.

use std::path::PathBuf;
use std::time::Duration;

use mdxdb_clickhouse::ClickHouseConfig;
use mdxdb_core::{MdxdbError, Result};
use mdxdb_embeddings::{DEFAULT_DIMENSION, DEFAULT_MODEL};
use mdxdb_fetch::FetchConfig;
use mdxdb_fs::FsConfig;
use serde::{Deserialize, Serialize};

/// Everything needed to open one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdxdbConfig {
    /// Which backend stores the namespace.
    pub backend: BackendConfig,

    /// How text is turned into vectors.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl MdxdbConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Read the configuration from the process environment.
    ///
    /// | variable              | meaning                                   |
    /// |-----------------------|-------------------------------------------|
    /// | `MDXDB_BACKEND`       | `fs` (default), `clickhouse` or `fetch`   |
    /// | `MDXDB_ROOT`          | fs root directory, default `.`            |
    /// | `MDXDB_NAMESPACE`     | namespace override                        |
    /// | `MDXDB_DIMENSIONS`    | vector width, default 256                 |
    /// | `CLICKHOUSE_URL`      | required for `clickhouse`                 |
    /// | `CLICKHOUSE_USERNAME` |                                           |
    /// | `CLICKHOUSE_PASSWORD` |                                           |
    /// | `CLICKHOUSE_DATABASE` | default `mdxdb`                           |
    /// | `MDXDB_FETCH_URL`     | required for `fetch`                      |
    /// | `MDXDB_API_KEY`       | bearer token for `fetch`                  |
    /// | `MDXDB_EMBEDDING_CACHE` | `memory` (default), `disk` or `off`     |
    /// | `OPENAI_API_KEY`      | embedding provider key                    |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`MdxdbConfig::from_env`] with a custom variable source.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &str, backend: &str| {
            var(name).ok_or_else(|| {
                MdxdbError::Configuration(format!("{name} must be set for the {backend} backend"))
            })
        };

        let dimensions = match var("MDXDB_DIMENSIONS") {
            Some(value) => value.parse::<usize>().map_err(|e| {
                MdxdbError::Configuration(format!("invalid MDXDB_DIMENSIONS {value}: {e}"))
            })?,
            None => DEFAULT_DIMENSION,
        };
        let namespace = var("MDXDB_NAMESPACE");

        let backend_name = var("MDXDB_BACKEND").unwrap_or_else(|| "fs".to_string());
        let backend = match backend_name.to_ascii_lowercase().as_str() {
            "fs" | "filesystem" => {
                let mut config = FsConfig::new(var("MDXDB_ROOT").unwrap_or_else(|| ".".to_string()))
                    .with_dimensions(dimensions);
                if let Some(namespace) = namespace {
                    config = config.with_namespace(namespace);
                }
                BackendConfig::Fs(config)
            }
            "clickhouse" => {
                let mut config = ClickHouseConfig::new(require("CLICKHOUSE_URL", "clickhouse")?)
                    .with_dimensions(dimensions);
                if let Some(username) = var("CLICKHOUSE_USERNAME") {
                    config = config
                        .with_credentials(username, var("CLICKHOUSE_PASSWORD").unwrap_or_default());
                }
                if let Some(database) = var("CLICKHOUSE_DATABASE") {
                    config = config.with_database(database);
                }
                if let Some(namespace) = namespace {
                    config = config.with_namespace(namespace);
                }
                BackendConfig::ClickHouse(config)
            }
            "fetch" | "http" => {
                let mut config = FetchConfig::new(require("MDXDB_FETCH_URL", "fetch")?);
                if let Some(api_key) = var("MDXDB_API_KEY") {
                    config = config.with_api_key(api_key);
                }
                if let Some(namespace) = namespace {
                    config = config.with_namespace(namespace);
                }
                BackendConfig::Fetch(config)
            }
            other => {
                return Err(MdxdbError::Configuration(format!(
                    "unknown MDXDB_BACKEND {other}; expected fs, clickhouse or fetch"
                )));
            }
        };

        let cache = match var("MDXDB_EMBEDDING_CACHE") {
            Some(value) => value.parse()?,
            None => CacheMode::default(),
        };
        let embedding = EmbeddingConfig {
            dimensions,
            api_key: var("OPENAI_API_KEY"),
            cache,
            ..EmbeddingConfig::default()
        };

        Ok(Self { backend, embedding })
    }
}

/// Backend selection. Serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Fs(FsConfig),
    #[serde(rename = "clickhouse")]
    ClickHouse(ClickHouseConfig),
    Fetch(FetchConfig),
}

impl BackendConfig {
    /// Vector width the backend stores, if it stores any itself.
    pub fn dimensions(&self) -> Option<usize> {
        match self {
            Self::Fs(config) => Some(config.dimensions),
            Self::ClickHouse(config) => Some(config.dimensions),
            Self::Fetch(_) => None,
        }
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to request.
    pub model: String,

    /// Requested output width.
    pub dimensions: usize,

    /// Falls back to `OPENAI_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub timeout_secs: u64,

    pub cache: CacheMode,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// Where a `disk` cache lives. Defaults to the platform cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSION,
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            cache: CacheMode::default(),
            cache_max_entries: 10_000,
            cache_path: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// File backing a `disk` cache.
    pub fn resolved_cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("mdxdb").join("embeddings.json"))
            .ok_or_else(|| {
                MdxdbError::Configuration(
                    "no platform cache directory; set cache_path explicitly".to_string(),
                )
            })
    }
}

/// Whether generated embeddings are memoised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    Off,
    #[default]
    Memory,
    /// In memory and persisted as JSON.
    Disk,
}

impl std::str::FromStr for CacheMode {
    type Err = MdxdbError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            other => Err(MdxdbError::Configuration(format!(
                "unknown embedding cache mode {other}; expected off, memory or disk"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_to_fs() {
        let config = MdxdbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, BackendConfig::Fs(FsConfig::new(".")));
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_clickhouse_from_env() {
        let config = MdxdbConfig::from_lookup(lookup(&[
            ("MDXDB_BACKEND", "clickhouse"),
            ("CLICKHOUSE_URL", "http://ch:8123"),
            ("CLICKHOUSE_USERNAME", "default"),
            ("CLICKHOUSE_PASSWORD", "secret"),
            ("CLICKHOUSE_DATABASE", "docs"),
            ("MDXDB_DIMENSIONS", "128"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::ClickHouse(
                ClickHouseConfig::new("http://ch:8123")
                    .with_credentials("default", "secret")
                    .with_database("docs")
                    .with_dimensions(128)
            )
        );
        assert_eq!(config.embedding.dimensions, 128);
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_missing_required_values() {
        let err = MdxdbConfig::from_lookup(lookup(&[("MDXDB_BACKEND", "clickhouse")]))
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("CLICKHOUSE_URL"));

        let err = MdxdbConfig::from_lookup(lookup(&[
            ("MDXDB_BACKEND", "fetch"),
            ("MDXDB_FETCH_URL", " "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MDXDB_FETCH_URL"));
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [("MDXDB_BACKEND", "sqlite")],
            [("MDXDB_DIMENSIONS", "wide")],
            [("MDXDB_EMBEDDING_CACHE", "redis")],
        ] {
            assert!(matches!(
                MdxdbConfig::from_lookup(lookup(&vars)),
                Err(MdxdbError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_fetch_from_env() {
        let config = MdxdbConfig::from_lookup(lookup(&[
            ("MDXDB_BACKEND", "fetch"),
            ("MDXDB_FETCH_URL", "https://db.example.com/api"),
            ("MDXDB_API_KEY", "token"),
            ("MDXDB_EMBEDDING_CACHE", "off"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Fetch(
                FetchConfig::new("https://db.example.com/api").with_api_key("token")
            )
        );
        assert_eq!(config.backend.dimensions(), None);
        assert_eq!(config.embedding.cache, CacheMode::Off);
    }

    #[test]
    fn test_tagged_config_file() {
        let config: MdxdbConfig = serde_json::from_value(serde_json::json!({
            "backend": {"type": "fs", "root": "content/example.com"},
            "embedding": {"model": "text-embedding-3-large", "cache": "disk"}
        }))
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Fs(FsConfig::new("content/example.com"))
        );
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.embedding.dimensions, 256);
        assert_eq!(config.embedding.cache, CacheMode::Disk);
    }

    #[test]
    fn test_explicit_cache_path() {
        let config = EmbeddingConfig {
            cache_path: Some(PathBuf::from("/tmp/mdxdb-cache.json")),
            ..EmbeddingConfig::default()
        };
        assert_eq!(
            config.resolved_cache_path().unwrap(),
            PathBuf::from("/tmp/mdxdb-cache.json")
        );
    }
}
