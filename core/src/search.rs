//! Search options and results.

use mdxdb_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::filter::Filter;

/// Minimum similarity kept when a search does not say otherwise.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Maximum number of results when a search does not say otherwise.
pub const DEFAULT_LIMIT: usize = 10;

/// Options for text search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default)]
    pub include_vectors: bool,
}

impl SearchOptions {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn include_vectors(mut self) -> Self {
        self.include_vectors = true;
        self
    }

    /// Turn into vector search options for an already embedded query.
    pub fn into_vector_search(self, vector: Embedding) -> VectorSearchOptions {
        VectorSearchOptions {
            vector: Some(vector),
            filter: self.filter,
            threshold: self.threshold,
            limit: self.limit,
            include_vectors: self.include_vectors,
        }
    }
}

/// Options for nearest-neighbour search by vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchOptions {
    /// Required; searches without it fail with `MissingVector`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Embedding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Echo each result's stored vector.
    #[serde(default)]
    pub include_vectors: bool,
}

impl VectorSearchOptions {
    pub fn new(vector: Embedding) -> Self {
        Self {
            vector: Some(vector),
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn include_vectors(mut self) -> Self {
        self.include_vectors = true;
        self
    }

    /// Threshold with the default applied.
    pub fn threshold_or_default(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    /// Limit with the default applied.
    pub fn limit_or_default(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,

    /// Similarity, higher is closer. Never a distance.
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Embedding>,
}
