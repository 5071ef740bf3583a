//! ClickHouse collection engine.
//!
//! Writes only ever append rows. Reads of single documents fold the whole
//! history with [`collapse`]; scans and searches go through the
//! `data_latest` view.

use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{
    Collapsed, CollectionProvider, Document, Embedding, EmbeddingProvider, Filter, MdxdbError,
    Result, SearchOptions, SearchResult, VectorSearchOptions, Versioned, collapse,
};
use mdxdb_embeddings::DEFAULT_DIMENSION;
use tracing::debug;

use crate::engine::ColumnarEngine;
use crate::query::{self, Query};
use crate::response::{RowMap, column_f64, normalize_rows};
use crate::row::Row;
use crate::schema::{self, VectorIndexConfig};

/// Score given to every full-text match.
pub const TEXT_MATCH_SCORE: f64 = 1.0;

/// A collection stored as rows of the shared `data` table.
pub struct ClickHouseCollection {
    name: String,
    database: String,
    namespace: String,
    engine: Arc<dyn ColumnarEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl ClickHouseCollection {
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        engine: Arc<dyn ColumnarEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let database = database.into();
        Self {
            name: name.into(),
            namespace: database.clone(),
            database,
            engine,
            embedder,
            dimensions: DEFAULT_DIMENSION,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<RowMap>> {
        let response = self.engine.query(&query.sql, &query.params).await?;
        normalize_rows(response)
    }

    async fn latest(&self) -> Result<Vec<Row>> {
        let query = query::select_latest(&self.database, &self.namespace, &self.name);
        self.fetch(&query)
            .await?
            .iter()
            .map(|row| Row::from_map(row).map(|versioned| versioned.value))
            .collect()
    }

    /// Fold every row written for `id`.
    async fn history(&self, id: &str) -> Result<Collapsed<Row>> {
        let query = query::select_history(&self.database, &self.namespace, &self.name, id);
        let rows = self
            .fetch(&query)
            .await?
            .iter()
            .map(Row::from_map)
            .collect::<Result<Vec<Versioned<Row>>>>()?;

        Ok(collapse(rows.into_iter().map(|row| (row.value.id.clone(), row)))
            .remove(id)
            .unwrap_or(Collapsed {
                live: None,
                max_version: 0,
            }))
    }

    async fn append(&self, rows: &[(&Row, i8)]) -> Result<()> {
        let values = rows
            .iter()
            .map(|(row, sign)| row.to_insert(*sign))
            .collect::<Result<Vec<_>>>()?;
        self.engine
            .exec(&query::insert_rows(&self.database, &values))
            .await
    }

    fn check_dimensions(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(MdxdbError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn validate_for_write(&self, document: &Document) -> Result<()> {
        document.validate()?;
        if let Some(vector) = &document.embeddings {
            self.check_dimensions(vector)?;
        }
        Ok(())
    }

    async fn embedding_for(&self, document: &Document) -> Result<Embedding> {
        let vector = match &document.embeddings {
            Some(vector) => vector.clone(),
            None => self.embedder.generate_embedding(&document.content).await?,
        };
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    /// Stamp bookkeeping fields and build the row for `version`.
    async fn prepare(&self, document: &mut Document, version: u64) -> Result<Row> {
        document.metadata.version = Some(version);
        if document.metadata.ns.is_none() {
            document.metadata.ns = Some(self.namespace.clone());
        }
        document.collections = Some(vec![self.name.clone()]);
        document.touch();

        let embedding = self.embedding_for(document).await?;
        Row::from_document(document, &self.namespace, &self.name, embedding, version)
    }

    fn not_found(&self, id: &str) -> MdxdbError {
        MdxdbError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl CollectionProvider for ClickHouseCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<()> {
        schema::bootstrap(
            self.engine.as_ref(),
            &self.database,
            &VectorIndexConfig::hnsw(self.dimensions),
        )
        .await
    }

    async fn get(&self) -> Result<Vec<Document>> {
        self.latest()
            .await?
            .into_iter()
            .map(Row::into_document)
            .collect()
    }

    async fn read(&self, id: &str) -> Result<Document> {
        self.history(id)
            .await?
            .live
            .ok_or_else(|| self.not_found(id))?
            .value
            .into_document()
    }

    async fn add(&self, mut document: Document) -> Result<Document> {
        document.ensure_id();
        self.validate_for_write(&document)?;

        let history = self.history(&document.id).await?;
        if history.live.is_some() {
            return Err(MdxdbError::DuplicateDocument {
                collection: self.name.clone(),
                id: document.id,
            });
        }

        let row = self.prepare(&mut document, history.next_version()).await?;
        self.append(&[(&row, 1)]).await?;

        debug!("Added {} to {} at version {}", document.id, self.name, row.version);
        Ok(document)
    }

    async fn update(&self, id: &str, mut document: Document) -> Result<Document> {
        document.set_id(id);
        self.validate_for_write(&document)?;

        let history = self.history(id).await?;
        let next_version = history.next_version();
        let current = history.live.ok_or_else(|| self.not_found(id))?;

        let row = self.prepare(&mut document, next_version).await?;
        self.append(&[(&current.value, -1), (&row, 1)]).await?;

        debug!("Updated {id} in {} to version {next_version}", self.name);
        Ok(document)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(current) = self.history(id).await?.live else {
            debug!("Delete of missing {id} in {} ignored", self.name);
            return Ok(());
        };

        self.append(&[(&current.value, -1)]).await?;
        debug!("Deleted {id} from {}", self.name);
        Ok(())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Document>> {
        let mut matched = Vec::new();
        for document in self.get().await? {
            if filter.matches_document(&document)? {
                matched.push(document);
            }
        }
        Ok(matched)
    }

    async fn search(&self, text: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        // A filter runs after the query, so the limit must too
        let sql_limit = if options.filter.is_none() {
            options.limit
        } else {
            None
        };
        let query = query::text_search(&self.database, &self.namespace, &self.name, text, sql_limit);

        let mut results = Vec::new();
        for row in self.fetch(&query).await? {
            let row = Row::from_map(&row)?.value;
            let vector = options.include_vectors.then(|| row.embedding.clone());
            let document = row.into_document()?;
            if let Some(filter) = &options.filter {
                if !filter.matches_document(&document)? {
                    continue;
                }
            }
            results.push(SearchResult {
                document,
                score: TEXT_MATCH_SCORE,
                vector,
            });
        }

        if let Some(limit) = options.limit {
            results.truncate(limit);
        }
        debug!("Text search in {} returned {} results", self.name, results.len());
        Ok(results)
    }

    async fn vector_search(&self, options: VectorSearchOptions) -> Result<Vec<SearchResult>> {
        let vector = options.vector.as_deref().ok_or(MdxdbError::MissingVector)?;
        self.check_dimensions(vector)?;

        let threshold = options.threshold_or_default();
        let limit = options.limit_or_default();
        let sql_limit = options.filter.is_none().then_some(limit);

        let query = query::vector_search(
            &self.database,
            &self.namespace,
            &self.name,
            vector,
            threshold,
            sql_limit,
        );

        let mut results = Vec::new();
        for map in self.fetch(&query).await? {
            let distance = column_f64(&map, "distance")?;
            let row = Row::from_map(&map)?.value;
            let stored = options.include_vectors.then(|| row.embedding.clone());
            let document = row.into_document()?;
            if let Some(filter) = &options.filter {
                if !filter.matches_document(&document)? {
                    continue;
                }
            }
            results.push(SearchResult {
                document,
                score: 1.0 - distance,
                vector: stored,
            });
        }
        results.truncate(limit);

        debug!(
            "Vector search in {} returned {} results (threshold {threshold}, limit {limit})",
            self.name,
            results.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingEngine, StubEmbedder, row};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const DIMS: usize = 256;

    fn collection(engine: &Arc<RecordingEngine>) -> ClickHouseCollection {
        ClickHouseCollection::new(
            "posts",
            "mdxdb",
            Arc::clone(engine) as Arc<dyn ColumnarEngine>,
            Arc::new(StubEmbedder::new(DIMS)) as Arc<dyn EmbeddingProvider>,
        )
        .with_namespace("example.com")
        .with_dimensions(DIMS)
    }

    #[tokio::test]
    async fn test_dimension_mismatch_before_any_query() {
        let engine = Arc::new(RecordingEngine::new());
        let err = collection(&engine)
            .vector_search(VectorSearchOptions::new(vec![0.1; 128]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MdxdbError::DimensionMismatch {
                expected: 256,
                actual: 128
            }
        ));
        assert!(engine.queries().is_empty());
        assert!(engine.execs().is_empty());
    }

    #[tokio::test]
    async fn test_missing_vector() {
        let engine = Arc::new(RecordingEngine::new());
        let err = collection(&engine)
            .vector_search(VectorSearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MdxdbError::MissingVector));
        assert!(engine.queries().is_empty());
    }

    #[tokio::test]
    async fn test_vector_search_maps_distance_to_score() {
        let engine = Arc::new(RecordingEngine::new());
        let mut near = row("near", 1, 1);
        near.insert("distance".to_string(), json!(0.05));
        let mut far = row("far", 1, 1);
        far.insert("distance".to_string(), json!(0.25));
        engine.respond(json!({"data": [near, far]}));

        let results = collection(&engine)
            .vector_search(
                VectorSearchOptions::new(vec![0.5; DIMS])
                    .with_threshold(0.7)
                    .with_limit(5)
                    .include_vectors(),
            )
            .await
            .unwrap();

        let scored: Vec<(&str, f64)> = results
            .iter()
            .map(|r| (r.document.id.as_str(), r.score))
            .collect();
        assert_eq!(scored, vec![("near", 0.95), ("far", 0.75)]);
        assert_eq!(results[0].vector.as_ref().map(Vec::len), Some(DIMS));

        let queries = engine.queries();
        assert_eq!(queries.len(), 1);
        let (sql, params) = &queries[0];
        assert!(sql.contains("ORDER BY distance ASC LIMIT {limit:UInt64}"));
        assert!((params["max_distance"].as_f64().unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(params["limit"], json!(5));
        assert_eq!(params["collection"], json!("posts"));
        assert_eq!(params["ns"], json!("example.com"));
    }

    #[tokio::test]
    async fn test_vector_search_filter_runs_before_limit() {
        let engine = Arc::new(RecordingEngine::new());
        let rows: Vec<_> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut r = row(id, 1, 1);
                r.insert("distance".to_string(), json!(0.1 * i as f64));
                if *id != "a" {
                    r.insert("data".to_string(), json!({"$id": id, "$type": "Post", "keep": true}));
                }
                r
            })
            .collect();
        engine.respond(json!(rows));

        let results = collection(&engine)
            .vector_search(
                VectorSearchOptions::new(vec![0.5; DIMS])
                    .with_limit(1)
                    .with_filter(Filter::eq("data.keep", true)),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "b");
        let (sql, params) = &engine.queries()[0];
        assert!(!sql.contains("LIMIT"));
        assert!(!params.contains_key("limit"));
    }

    #[tokio::test]
    async fn test_add_appends_first_version() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!({"data": []}));

        let added = collection(&engine)
            .add(Document::new("Post", "hello").with_id("p1"))
            .await
            .unwrap();
        assert_eq!(added.metadata.version, Some(1));
        assert_eq!(added.metadata.ns.as_deref(), Some("example.com"));

        let execs = engine.execs();
        assert_eq!(execs.len(), 1);
        let inserted = engine.inserted_rows();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["id"], json!("p1"));
        assert_eq!(inserted[0]["type"], json!("posts"));
        assert_eq!(inserted[0]["version"], json!(1));
        assert_eq!(inserted[0]["sign"], json!(1));
        assert_eq!(inserted[0]["embedding"].as_array().map(Vec::len), Some(DIMS));
    }

    #[tokio::test]
    async fn test_add_duplicate() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([row("p1", 1, 1)]));

        let err = collection(&engine)
            .add(Document::new("Post", "again").with_id("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MdxdbError::DuplicateDocument { .. }));
        assert!(engine.execs().is_empty());
    }

    #[tokio::test]
    async fn test_re_add_after_delete_uses_next_version() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([row("p1", 1, 1), row("p1", 1, -1)]));

        let added = collection(&engine)
            .add(Document::new("Post", "back").with_id("p1"))
            .await
            .unwrap();
        assert_eq!(added.metadata.version, Some(2));
    }

    #[tokio::test]
    async fn test_update_writes_compensating_row() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([row("p1", 1, 1), row("p1", 1, -1), row("p1", 2, 1)]));

        let updated = collection(&engine)
            .update("p1", Document::new("Post", "v3"))
            .await
            .unwrap();
        assert_eq!(updated.id, "p1");
        assert_eq!(updated.metadata.version, Some(3));

        let inserted = engine.inserted_rows();
        assert_eq!(inserted.len(), 2);
        assert_eq!(
            (inserted[0]["version"].clone(), inserted[0]["sign"].clone()),
            (json!(2), json!(-1))
        );
        assert_eq!(
            (inserted[1]["version"].clone(), inserted[1]["sign"].clone()),
            (json!(3), json!(1))
        );
        assert_eq!(inserted[1]["content"], json!("v3"));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([]));

        let err = collection(&engine)
            .update("nope", Document::new("Post", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MdxdbError::NotFound { .. }));
        assert!(engine.execs().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([row("p1", 1, 1)]));
        engine.respond(json!([row("p1", 1, 1), row("p1", 1, -1)]));

        let posts = collection(&engine);
        posts.delete("p1").await.unwrap();
        posts.delete("p1").await.unwrap();

        let inserted = engine.inserted_rows();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["sign"], json!(-1));
        assert_eq!(inserted[0]["version"], json!(1));
    }

    #[tokio::test]
    async fn test_read() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([row("p1", 1, 1), row("p1", 1, -1), row("p1", 2, 1)]));
        engine.respond(json!([row("gone", 1, 1), row("gone", 1, -1)]));

        let posts = collection(&engine);
        let document = posts.read("p1").await.unwrap();
        assert_eq!(document.metadata.version, Some(2));
        document.validate().unwrap();

        assert!(matches!(
            posts.read("gone").await,
            Err(MdxdbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_and_find_one() {
        let engine = Arc::new(RecordingEngine::new());
        let rows = json!([row("a", 1, 1), row("b", 2, 1)]);
        engine.respond(rows.clone());
        engine.respond(rows);

        let posts = collection(&engine);
        let filter = Filter::parse(&json!({"metadata.version": {"$gte": 2}})).unwrap();
        let found = posts.find(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");

        let filter = Filter::parse(&json!({"metadata.data.priority": "medium"})).unwrap();
        assert_eq!(posts.find_one(&filter).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_text_search() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!([[row("a", 1, 1)]]));

        let results = collection(&engine)
            .search("hello", SearchOptions::default().with_limit(3))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, TEXT_MATCH_SCORE);

        let (sql, params) = &engine.queries()[0];
        assert!(sql.contains("content ILIKE {pattern:String}"));
        assert_eq!(params["pattern"], json!("%hello%"));
        assert_eq!(params["limit"], json!(3));
    }

    #[tokio::test]
    async fn test_unexpected_response_shape() {
        let engine = Arc::new(RecordingEngine::new());
        engine.respond(json!("nonsense"));

        let err = collection(&engine).get().await.unwrap_err();
        assert!(matches!(err, MdxdbError::UnexpectedResponseFormat(_)));
    }
}
