//! Remote collection.
//!
//! | operation       | request                                  |
//! |-----------------|------------------------------------------|
//! | `create`        | `PUT    /{collection}`                   |
//! | `get`           | `GET    /{collection}`                   |
//! | `add`           | `POST   /{collection}`                   |
//! | `read`          | `GET    /{collection}/{id}`              |
//! | `update`        | `PUT    /{collection}/{id}`              |
//! | `delete`        | `DELETE /{collection}/{id}`              |
//! | `find`          | `POST   /{collection}/_find`             |
//! | `search`        | `POST   /{collection}/_search`           |
//! | `vector_search` | `POST   /{collection}/_vector_search`    |

use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{
    CollectionProvider, Document, Filter, MdxdbError, Result, SearchOptions, SearchResult,
    VectorSearchOptions,
};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{FetchClient, Target};

/// Body of a `_search` request.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(flatten)]
    options: &'a SearchOptions,
}

/// Body of a `_find` request.
#[derive(Debug, Serialize)]
struct FindRequest<'a> {
    filter: &'a Filter,
}

/// A collection served by a remote mdxdb service.
pub struct FetchCollection {
    name: String,
    client: Arc<FetchClient>,
}

impl FetchCollection {
    pub fn new(name: impl Into<String>, client: Arc<FetchClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    fn target<'a>(&'a self, operation: &'static str, id: Option<&'a str>) -> Target<'a> {
        Target {
            operation,
            collection: &self.name,
            id,
        }
    }
}

#[async_trait]
impl CollectionProvider for FetchCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<()> {
        self.client
            .send::<Value>(Method::PUT, &[&self.name], None, self.target("create", None))
            .await?;
        Ok(())
    }

    async fn get(&self) -> Result<Vec<Document>> {
        self.client
            .send_json::<Value, _>(Method::GET, &[&self.name], None, self.target("get", None))
            .await
    }

    async fn read(&self, id: &str) -> Result<Document> {
        self.client
            .send_json::<Value, _>(
                Method::GET,
                &[&self.name, id],
                None,
                self.target("read", Some(id)),
            )
            .await
    }

    async fn add(&self, document: Document) -> Result<Document> {
        let id = document.id.clone();
        let added: Document = self
            .client
            .send_json(
                Method::POST,
                &[&self.name],
                Some(&document),
                self.target("add", Some(id.as_str())),
            )
            .await?;
        debug!("Added {} to remote collection {}", added.id, self.name);
        Ok(added)
    }

    async fn update(&self, id: &str, document: Document) -> Result<Document> {
        self.client
            .send_json(
                Method::PUT,
                &[&self.name, id],
                Some(&document),
                self.target("update", Some(id)),
            )
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = self
            .client
            .send::<Value>(
                Method::DELETE,
                &[&self.name, id],
                None,
                self.target("delete", Some(id)),
            )
            .await;
        match result {
            Ok(_) | Err(MdxdbError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Document>> {
        self.client
            .send_json(
                Method::POST,
                &[&self.name, "_find"],
                Some(&FindRequest { filter }),
                self.target("find", None),
            )
            .await
    }

    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        self.client
            .send_json(
                Method::POST,
                &[&self.name, "_search"],
                Some(&SearchRequest {
                    query,
                    options: &options,
                }),
                self.target("search", None),
            )
            .await
    }

    async fn vector_search(&self, options: VectorSearchOptions) -> Result<Vec<SearchResult>> {
        if options.vector.is_none() {
            return Err(MdxdbError::MissingVector);
        }
        self.client
            .send_json(
                Method::POST,
                &[&self.name, "_vector_search"],
                Some(&options),
                self.target("vector_search", None),
            )
            .await
    }
}
