//! HTTP database provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{CollectionProvider, DatabaseProvider, MdxdbError, Result};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::{FetchClient, Target};
use crate::collection::FetchCollection;
use crate::config::FetchConfig;

/// A namespace served by a remote mdxdb service.
pub struct FetchDatabase {
    namespace: String,
    client: Arc<FetchClient>,
    collections: RwLock<HashMap<String, Arc<FetchCollection>>>,
}

impl FetchDatabase {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            namespace: config.namespace(),
            client: Arc::new(FetchClient::new(config)?),
            collections: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl DatabaseProvider for FetchDatabase {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Nothing is opened eagerly; the service is contacted per operation.
    async fn connect(&self) -> Result<()> {
        info!(
            "Using remote mdxdb at {} for namespace {}",
            self.client.url(&[]),
            self.namespace
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.collections.write().await.clear();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let target = Target {
            operation: "list",
            collection: "",
            id: None,
        };
        let mut names: Vec<String> = self
            .client
            .send_json::<Value, _>(Method::GET, &[], None, target)
            .await?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionProvider>> {
        if name.is_empty() {
            return Err(MdxdbError::Configuration(
                "collection name must not be empty".to_string(),
            ));
        }
        if let Some(collection) = self.collections.read().await.get(name) {
            return Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>);
        }

        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.to_string()).or_insert_with(|| {
            debug!("Opening remote collection {name}");
            Arc::new(FetchCollection::new(name, Arc::clone(&self.client)))
        });
        Ok(Arc::clone(collection) as Arc<dyn CollectionProvider>)
    }
}
