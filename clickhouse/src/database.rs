//! ClickHouse database provider.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{CollectionProvider, DatabaseProvider, EmbeddingProvider, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::collection::ClickHouseCollection;
use crate::config::ClickHouseConfig;
use crate::engine::{ColumnarEngine, HttpEngine};
use crate::query;
use crate::response::{column_str, normalize_rows};
use crate::schema::{self, VectorIndexConfig};

/// A namespace stored in one ClickHouse database.
pub struct ClickHouseDatabase {
    config: ClickHouseConfig,
    engine: Arc<dyn ColumnarEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Arc<ClickHouseCollection>>>,
}

impl ClickHouseDatabase {
    /// Talk to the server named in `config` over HTTP.
    pub fn new(config: ClickHouseConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let engine = Arc::new(HttpEngine::new(&config));
        Self::with_engine(config, engine, embedder)
    }

    /// Use an existing engine.
    pub fn with_engine(
        config: ClickHouseConfig,
        engine: Arc<dyn ColumnarEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            engine,
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

#[async_trait]
impl DatabaseProvider for ClickHouseDatabase {
    fn namespace(&self) -> &str {
        self.config.namespace()
    }

    async fn connect(&self) -> Result<()> {
        schema::validate_identifier(&self.config.database)?;
        schema::check_version(self.engine.as_ref()).await?;
        schema::bootstrap(
            self.engine.as_ref(),
            &self.config.database,
            &VectorIndexConfig::hnsw(self.config.dimensions),
        )
        .await?;
        info!(
            "Connected ClickHouse database {} for namespace {}",
            self.config.database,
            self.namespace()
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.collections.write().await.clear();
        info!("Disconnected ClickHouse database {}", self.config.database);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let query = query::list_collections(&self.config.database, self.namespace());
        let rows = normalize_rows(self.engine.query(&query.sql, &query.params).await?)?;

        let mut names: BTreeSet<String> = rows
            .iter()
            .map(|row| column_str(row, "name").to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.extend(self.collections.read().await.keys().cloned());
        Ok(names.into_iter().collect())
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionProvider>> {
        if let Some(collection) = self.collections.read().await.get(name) {
            return Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>);
        }

        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            debug!("Opening collection {name} in {}", self.config.database);
            Arc::new(
                ClickHouseCollection::new(
                    name,
                    &self.config.database,
                    Arc::clone(&self.engine),
                    Arc::clone(&self.embedder),
                )
                .with_namespace(self.config.namespace())
                .with_dimensions(self.config.dimensions),
            )
        });
        Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingEngine, StubEmbedder};
    use mdxdb_core::MdxdbError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn database(engine: &Arc<RecordingEngine>) -> ClickHouseDatabase {
        ClickHouseDatabase::with_engine(
            ClickHouseConfig::default().with_namespace("example.com"),
            Arc::clone(engine) as Arc<dyn ColumnarEngine>,
            Arc::new(StubEmbedder::new(256)) as Arc<dyn EmbeddingProvider>,
        )
    }

    #[tokio::test]
    async fn test_connect_checks_version_then_bootstraps() {
        let engine = Arc::new(RecordingEngine::new());
        database(&engine).connect().await.unwrap();

        let execs = engine.execs();
        assert_eq!(execs.len(), 3);
        assert_eq!(execs[0], "CREATE DATABASE IF NOT EXISTS mdxdb");
    }

    #[tokio::test]
    async fn test_old_server_is_rejected() {
        let engine = Arc::new(RecordingEngine::with_version("24.9.2.42"));
        let err = database(&engine).connect().await.unwrap_err();

        assert!(matches!(err, MdxdbError::UnsupportedEngineVersion(_)));
        assert_eq!(
            err.to_string(),
            "ClickHouse version 24.10 or higher is required (found 24.9.2.42)"
        );
        assert!(engine.execs().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_database_name() {
        let engine = Arc::new(RecordingEngine::new());
        let db = ClickHouseDatabase::with_engine(
            ClickHouseConfig::default().with_database("bad-name"),
            Arc::clone(&engine) as Arc<dyn ColumnarEngine>,
            Arc::new(StubEmbedder::new(256)) as Arc<dyn EmbeddingProvider>,
        );
        assert!(matches!(
            db.connect().await,
            Err(MdxdbError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_list_merges_stored_and_opened() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!({"data": [{"name": "posts"}, {"name": "authors"}]}));

        let db = database(&engine);
        assert_eq!(db.namespace(), "example.com");
        db.collection("drafts").await.unwrap();
        db.collection("posts").await.unwrap();

        assert_eq!(
            db.list().await.unwrap(),
            vec![
                "authors".to_string(),
                "drafts".to_string(),
                "posts".to_string()
            ]
        );

        let (_, params) = &engine.queries()[0];
        assert_eq!(params["ns"], json!("example.com"));
    }

    #[tokio::test]
    async fn test_collections_are_cached() {
        let engine = Arc::new(RecordingEngine::new());
        let db = database(&engine);
        let first = db.collection("posts").await.unwrap();
        let second = db.collection("posts").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
