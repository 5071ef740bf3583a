//! Document types.
//!
//! A document carries its identifier three times: on the document itself,
//! as `data.$id`, and as `metadata.id`. The three must always agree.

use mdxdb_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{MdxdbError, Result};

/// Structured payload with JSON-LD style reserved keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    /// Must equal the document identifier.
    #[serde(rename = "$id")]
    pub id: String,

    #[serde(rename = "$type")]
    pub doc_type: String,

    #[serde(rename = "$context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Every other key of the payload.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Tracking record kept alongside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,

    #[serde(rename = "type")]
    pub doc_type: String,

    /// Last write time in epoch milliseconds.
    pub ts: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    /// SHA-256 of the content, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Free-form tracking fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A document stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Empty until the collection assigns one.
    pub id: String,

    /// Raw text body.
    pub content: String,

    pub data: DocumentData,

    pub metadata: DocumentMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Embedding>,

    /// Names of the collections this document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
}

impl Document {
    /// Create a document without an identifier.
    pub fn new(doc_type: impl Into<String>, content: impl Into<String>) -> Self {
        let doc_type = doc_type.into();
        let content = content.into();
        Self {
            id: String::new(),
            data: DocumentData {
                id: String::new(),
                doc_type: doc_type.clone(),
                context: None,
                fields: Map::new(),
            },
            metadata: DocumentMetadata {
                id: String::new(),
                doc_type,
                ts: chrono::Utc::now().timestamp_millis(),
                ns: None,
                host: None,
                path: None,
                version: Some(1),
                hash: Some(content_hash(&content)),
                extra: Map::new(),
            },
            content,
            embeddings: None,
            collections: None,
        }
    }

    /// Set the identifier everywhere it is recorded.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    /// Add a field to the structured payload.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.fields.insert(key.into(), value.into());
        self
    }

    /// Attach a precomputed embedding.
    pub fn with_embeddings(mut self, embeddings: Embedding) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Set the namespace in the tracking record.
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.metadata.ns = Some(ns.into());
        self
    }

    /// Set the identifier on the document, its data and its metadata.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.data.id = id.clone();
        self.metadata.id = id.clone();
        self.id = id;
    }

    /// Assign a fresh UUID when the document has no identifier yet.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.set_id(Uuid::new_v4().to_string());
        }
        &self.id
    }

    /// Refresh the timestamp and content hash after a write.
    pub fn touch(&mut self) {
        self.metadata.ts = chrono::Utc::now().timestamp_millis();
        self.metadata.hash = Some(content_hash(&self.content));
    }

    /// Check the identifier invariant.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(MdxdbError::InvalidDocument(
                "document identifier is empty".to_string(),
            ));
        }
        if self.data.id != self.id || self.metadata.id != self.id {
            return Err(MdxdbError::InvalidDocument(format!(
                "identifier mismatch: id={}, data.$id={}, metadata.id={}",
                self.id, self.data.id, self.metadata.id
            )));
        }
        Ok(())
    }

    /// JSON form used for filter evaluation and wire transfer.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// SHA-256 of `content`, hex encoded.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}
