//! Database and collection provider contracts.
//!
//! Each backend implements both traits once. Callers pick a backend at
//! construction time and only ever talk to `dyn DatabaseProvider` and
//! `dyn CollectionProvider` afterwards.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;
use crate::filter::Filter;
use crate::search::{SearchOptions, SearchResult, VectorSearchOptions};

/// CRUD and search over the documents of one named collection.
#[async_trait]
pub trait CollectionProvider: Send + Sync {
    /// Name of the collection.
    fn name(&self) -> &str;

    /// Make sure the collection's storage exists. Idempotent.
    async fn create(&self) -> Result<()>;

    /// Every document in the collection (the "list" operation).
    async fn get(&self) -> Result<Vec<Document>>;

    /// One document by identifier; `NotFound` if absent.
    async fn read(&self, id: &str) -> Result<Document>;

    /// Insert a new document, assigning an identifier when it has none.
    ///
    /// Fails with `DuplicateDocument` if the identifier is taken.
    async fn add(&self, document: Document) -> Result<Document>;

    /// Replace an existing document; `NotFound` if absent.
    async fn update(&self, id: &str, document: Document) -> Result<Document>;

    /// Remove a document and its embedding. Deleting a missing id is a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Documents matching `filter`.
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>>;

    /// First document matching `filter`.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    /// Embed `query` and run a vector search with it.
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>>;

    /// Nearest neighbours of `options.vector`, best first.
    async fn vector_search(&self, options: VectorSearchOptions) -> Result<Vec<SearchResult>>;
}

/// Namespace-level registry of collections.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Namespace served by this provider.
    fn namespace(&self) -> &str;

    /// Open connections and bootstrap storage.
    async fn connect(&self) -> Result<()>;

    /// Release connections. The provider may be connected again later.
    async fn disconnect(&self) -> Result<()>;

    /// Names of the known collections.
    async fn list(&self) -> Result<Vec<String>>;

    /// Handle to the named collection, created lazily.
    async fn collection(&self, name: &str) -> Result<Arc<dyn CollectionProvider>>;
}
