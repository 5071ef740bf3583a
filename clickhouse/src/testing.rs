//! Test doubles for the engine and the embedding provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use mdxdb_core::Result;
use mdxdb_embeddings::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use serde_json::{Map, Value, json};

use crate::engine::ColumnarEngine;
use crate::response::RowMap;

/// Records every statement and answers queries from a queue.
pub(crate) struct RecordingEngine {
    version: String,
    responses: Mutex<VecDeque<Value>>,
    queries: Mutex<Vec<(String, Map<String, Value>)>>,
    execs: Mutex<Vec<String>>,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self::with_version("24.10.1.2812")
    }

    pub(crate) fn with_version(version: &str) -> Self {
        Self {
            version: version.to_string(),
            responses: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            execs: Mutex::new(Vec::new()),
        }
    }

    /// Queue the response for the next query.
    pub(crate) fn respond(&self, response: Value) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn queries(&self) -> Vec<(String, Map<String, Value>)> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn execs(&self) -> Vec<String> {
        self.execs.lock().unwrap().clone()
    }

    /// Rows of every `JSONEachRow` insert, in order.
    pub(crate) fn inserted_rows(&self) -> Vec<Value> {
        self.execs()
            .iter()
            .filter(|sql| sql.starts_with("INSERT"))
            .flat_map(|sql| {
                sql.lines()
                    .skip(1)
                    .map(|line| serde_json::from_str(line).unwrap())
                    .collect::<Vec<Value>>()
            })
            .collect()
    }
}

#[async_trait]
impl ColumnarEngine for RecordingEngine {
    async fn query(&self, sql: &str, params: &Map<String, Value>) -> Result<Value> {
        self.queries
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!([])))
    }

    async fn exec(&self, sql: &str) -> Result<()> {
        self.execs.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn version(&self) -> Result<String> {
        Ok(self.version.clone())
    }
}

/// Returns a constant vector of the configured width.
pub(crate) struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    fn default_model(&self) -> &str {
        "stub"
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _request: EmbeddingRequest) -> mdxdb_embeddings::Result<EmbeddingResponse> {
        Ok(EmbeddingResponse {
            embedding: vec![0.5; self.dimension],
            model: "stub".to_string(),
            dimension: self.dimension,
            tokens_used: None,
        })
    }
}

/// A `data` row as `FORMAT JSON` returns it.
pub(crate) fn row(id: &str, version: u64, sign: i8) -> RowMap {
    let Value::Object(map) = json!({
        "id": id,
        "ns": "example.com",
        "type": "posts",
        "path": [],
        "data": {"$id": id, "$type": "Post"},
        "content": format!("content of {id}"),
        "embedding": vec![0.5; 256],
        "ts_ms": "1700000000000",
        "hash": "",
        "version": version.to_string(),
        "sign": sign,
    }) else {
        unreachable!()
    };
    map
}
