//! Filesystem collection engine.
//!
//! Each document is one MDX file under `<root>/<collection>/`, named after
//! its URL-encoded identifier. Vectors live in the shared sidecar store and
//! are scored in process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mdxdb_core::{
    CollectionProvider, Document, Embedding, EmbeddingProvider, EmbeddingStore, Filter,
    MdxdbError, Result, SearchOptions, SearchResult, VectorSearchOptions,
};
use mdxdb_embeddings::{DEFAULT_DIMENSION, cosine_similarity, rank};
use tracing::{debug, warn};

use crate::content::ContentStore;
use crate::format;

/// Extension used for new documents.
pub const DOCUMENT_EXTENSION: &str = "mdx";

/// Extensions recognised as documents when reading.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["mdx", "md"];

/// `$type` given to documents whose file does not declare one.
pub const DEFAULT_DOCUMENT_TYPE: &str = "Document";

/// Sidecar key of a document. Collections share one sidecar per database,
/// so entries are scoped by collection name.
pub fn embedding_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// A collection stored as a directory of MDX files.
pub struct FsCollection {
    name: String,
    namespace: String,
    content: Arc<dyn ContentStore>,
    embeddings: Arc<dyn EmbeddingStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl FsCollection {
    pub fn new(
        name: impl Into<String>,
        content: Arc<dyn ContentStore>,
        embeddings: Arc<dyn EmbeddingStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            content,
            embeddings,
            embedder,
            dimensions: DEFAULT_DIMENSION,
        }
    }

    /// Namespace stamped on documents that do not carry one.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Width every stored and query vector must have.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn artifact_path(&self, id: &str, extension: &str) -> String {
        format!("{}/{}.{extension}", self.name, urlencoding::encode(id))
    }

    /// Identifier encoded in a file name, if it names a document.
    fn id_from_file_name(file_name: &str) -> Option<String> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if stem.is_empty() || !DOCUMENT_EXTENSIONS.contains(&extension) {
            return None;
        }
        match urlencoding::decode(stem) {
            Ok(id) => Some(id.into_owned()),
            Err(e) => {
                warn!("Skipping {file_name}: undecodable name: {e}");
                None
            }
        }
    }

    /// Raw bytes of the document file, trying every known extension.
    async fn locate(&self, id: &str) -> Result<Option<Vec<u8>>> {
        for extension in DOCUMENT_EXTENSIONS {
            let path = self.artifact_path(id, extension);
            if let Some(bytes) = self.content.read_artifact(&path).await? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn decode(&self, id: &str, bytes: &[u8]) -> Result<Document> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MdxdbError::InvalidDocument(format!("{id} is not UTF-8: {e}")))?;
        let mut document = format::decode(text, id, DEFAULT_DOCUMENT_TYPE)?;
        document.collections = Some(vec![self.name.clone()]);
        Ok(document)
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

    fn embedding_key(&self, id: &str) -> String {
        embedding_key(&self.name, id)
    }

    fn not_found(&self, id: &str) -> MdxdbError {
        MdxdbError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }

    /// Persist the file, then its embedding.
    ///
    /// The two writes are not atomic together. A document whose embedding
    /// never landed scores 0 in vector search.
    async fn write(&self, mut document: Document) -> Result<Document> {
        if document.metadata.ns.is_none() && !self.namespace.is_empty() {
            document.metadata.ns = Some(self.namespace.clone());
        }
        document.collections = Some(vec![self.name.clone()]);
        document.touch();

        let path = self.artifact_path(&document.id, DOCUMENT_EXTENSION);
        let text = format::encode(&document)?;
        self.content.write_artifact(&path, text.as_bytes()).await?;

        let vector: Embedding = match &document.embeddings {
            Some(vector) => vector.clone(),
            None => {
                let vector = self.embedder.generate_embedding(&document.content).await?;
                self.check_dimensions(&vector)?;
                vector
            }
        };
        self.embeddings
            .store_embedding(
                &self.embedding_key(&document.id),
                &document.content,
                &vector,
            )
            .await?;

        Ok(document)
    }

    /// Reject bad documents before any I/O.
    fn validate_for_write(&self, document: &Document) -> Result<()> {
        document.validate()?;
        if let Some(vector) = &document.embeddings {
            self.check_dimensions(vector)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionProvider for FsCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<()> {
        self.content.list_artifacts(&self.name).await?;
        Ok(())
    }

    async fn get(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for file_name in self.content.list_artifacts(&self.name).await? {
            let Some(id) = Self::id_from_file_name(&file_name) else {
                continue;
            };
            let path = format!("{}/{file_name}", self.name);
            let Some(bytes) = self.content.read_artifact(&path).await? else {
                continue;
            };
            match self.decode(&id, &bytes) {
                Ok(document) => documents.push(document),
                Err(e) => warn!("Skipping unreadable document {path}: {e}"),
            }
        }

        debug!("Listed {} documents in {}", documents.len(), self.name);
        Ok(documents)
    }

    async fn read(&self, id: &str) -> Result<Document> {
        let bytes = self.locate(id).await?.ok_or_else(|| self.not_found(id))?;
        self.decode(id, &bytes)
    }

    async fn add(&self, mut document: Document) -> Result<Document> {
        document.ensure_id();
        self.validate_for_write(&document)?;

        if self.locate(&document.id).await?.is_some() {
            return Err(MdxdbError::DuplicateDocument {
                collection: self.name.clone(),
                id: document.id,
            });
        }

        let document = self.write(document).await?;
        debug!("Added {} to {}", document.id, self.name);
        Ok(document)
    }

    async fn update(&self, id: &str, mut document: Document) -> Result<Document> {
        document.set_id(id);
        self.validate_for_write(&document)?;

        let existing = self.read(id).await?;
        document.metadata.version = Some(existing.metadata.version.unwrap_or(1) + 1);
        if document.metadata.ns.is_none() {
            document.metadata.ns = existing.metadata.ns;
        }

        self.delete(id).await?;
        let document = self.write(document).await?;
        debug!(
            "Updated {id} in {} to version {:?}",
            self.name, document.metadata.version
        );
        Ok(document)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        for extension in DOCUMENT_EXTENSIONS {
            self.content
                .delete_artifact(&self.artifact_path(id, extension))
                .await?;
        }
        self.embeddings
            .delete_embedding(&self.embedding_key(id))
            .await?;
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

    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.generate_embedding(query).await?;
        self.vector_search(options.into_vector_search(vector)).await
    }

    async fn vector_search(&self, options: VectorSearchOptions) -> Result<Vec<SearchResult>> {
        let query = options.vector.as_deref().ok_or(MdxdbError::MissingVector)?;
        self.check_dimensions(query)?;

        let threshold = options.threshold_or_default();
        let limit = options.limit_or_default();

        let documents = self.get().await?;
        let mut stored: HashMap<String, Embedding> = self
            .embeddings
            .get_all_embeddings()
            .await?
            .into_iter()
            .map(|entry| (entry.id, entry.embedding))
            .collect();

        let mut scored = Vec::with_capacity(documents.len());
        for document in documents {
            if let Some(filter) = &options.filter {
                if !filter.matches_document(&document)? {
                    continue;
                }
            }

            let vector = stored.remove(&self.embedding_key(&document.id));
            let score = match &vector {
                Some(vector) => match cosine_similarity(query, vector) {
                    Ok(score) => score,
                    Err(e) => {
                        warn!("Scoring {} as 0: {e}", document.id);
                        0.0
                    }
                },
                None => {
                    warn!("No embedding stored for {}, scoring 0", document.id);
                    0.0
                }
            };
            scored.push(((document, vector), score));
        }

        let results: Vec<SearchResult> = rank(scored, threshold, limit)
            .into_iter()
            .map(|((document, vector), score)| SearchResult {
                document,
                score,
                vector: if options.include_vectors { vector } else { None },
            })
            .collect();

        debug!(
            "Vector search in {} returned {} results (threshold {threshold}, limit {limit})",
            self.name,
            results.len()
        );
        Ok(results)
    }
}
