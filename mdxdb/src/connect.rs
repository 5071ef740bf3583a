//! Backend selection.

use std::sync::Arc;

use mdxdb_clickhouse::ClickHouseDatabase;
use mdxdb_core::{DatabaseProvider, EmbeddingProvider, MdxdbError, Result};
use mdxdb_embeddings::{CachedProvider, EmbeddingCache, OpenAIProvider};
use mdxdb_fetch::FetchDatabase;
use mdxdb_fs::FsDatabase;
use tracing::{debug, info};

use crate::config::{BackendConfig, CacheMode, EmbeddingConfig, MdxdbConfig};

/// Open the configured database and connect it.
pub async fn connect(config: MdxdbConfig) -> Result<Arc<dyn DatabaseProvider>> {
    let database = open(config).await?;
    database.connect().await?;
    info!("mdxdb namespace {} ready", database.namespace());
    Ok(database)
}

/// Build the configured database without connecting it.
pub async fn open(config: MdxdbConfig) -> Result<Arc<dyn DatabaseProvider>> {
    if let Some(stored) = config.backend.dimensions() {
        if stored != config.embedding.dimensions {
            return Err(MdxdbError::Configuration(format!(
                "backend stores {stored}-dimensional vectors but embeddings are configured for {}",
                config.embedding.dimensions
            )));
        }
    }

    let database: Arc<dyn DatabaseProvider> = match config.backend {
        BackendConfig::Fs(fs) => {
            debug!("Opening filesystem backend at {}", fs.root.display());
            Arc::new(FsDatabase::new(fs, embedder(&config.embedding).await?))
        }
        BackendConfig::ClickHouse(clickhouse) => {
            debug!("Opening ClickHouse backend at {}", clickhouse.url);
            Arc::new(ClickHouseDatabase::new(
                clickhouse,
                embedder(&config.embedding).await?,
            ))
        }
        BackendConfig::Fetch(fetch) => {
            debug!("Opening HTTP backend at {}", fetch.url);
            Arc::new(FetchDatabase::new(&fetch)?)
        }
    };
    Ok(database)
}

/// The embedding provider described by `config`, cached unless disabled.
pub async fn embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let mut provider = OpenAIProvider::new()
        .with_model(&config.model)
        .with_dimension(config.dimensions)
        .with_timeout(config.timeout());
    if let Some(api_key) = &config.api_key {
        provider = provider.with_api_key(api_key);
    }
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url);
    }

    let cache = match config.cache {
        CacheMode::Off => return Ok(Arc::new(provider)),
        CacheMode::Memory => EmbeddingCache::new(config.cache_max_entries),
        CacheMode::Disk => {
            let path = config.resolved_cache_path()?;
            debug!("Persisting embedding cache to {}", path.display());
            EmbeddingCache::with_persistence(path, config.cache_max_entries).await?
        }
    };
    Ok(Arc::new(CachedProvider::new(provider, cache)))
}
