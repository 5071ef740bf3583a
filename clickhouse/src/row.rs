//! Rows of the `data` table.

use chrono::DateTime;
use mdxdb_core::{
    Document, DocumentData, DocumentMetadata, Embedding, MdxdbError, Result, Versioned,
};
use serde_json::{Map, Value, json};

use crate::response::{RowMap, column_i64, column_str, column_u64};

/// Column list for reads. `ts` comes back as epoch milliseconds in `ts_ms`.
pub const SELECT_COLUMNS: &str =
    "id, ns, type, path, data, content, embedding, toUnixTimestamp64Milli(ts) AS ts_ms, hash, version, sign";

/// Column list for inserts.
pub const INSERT_COLUMNS: &str = "id, ns, type, path, data, content, embedding, ts, hash, version, sign";

/// Key inside the `data` column holding metadata with no column of its own.
pub const METADATA_KEY: &str = "$metadata";

/// One stored version of a document. The `type` column holds the
/// collection name; the document's own `$type` stays inside `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub ns: String,
    pub collection: String,
    pub path: Vec<String>,
    pub data: Value,
    pub content: String,
    pub embedding: Embedding,
    pub ts: i64,
    pub hash: String,
    pub version: u64,
}

impl Row {
    pub fn from_document(
        document: &Document,
        ns: &str,
        collection: &str,
        embedding: Embedding,
        version: u64,
    ) -> Result<Self> {
        Ok(Self {
            id: document.id.clone(),
            ns: ns.to_string(),
            collection: collection.to_string(),
            path: document.metadata.path.clone().unwrap_or_default(),
            data: encode_data(document)?,
            content: document.content.clone(),
            embedding,
            ts: document.metadata.ts,
            hash: document.metadata.hash.clone().unwrap_or_default(),
            version,
        })
    }

    /// Decode a result row together with its sign.
    pub fn from_map(row: &RowMap) -> Result<Versioned<Self>> {
        let data = match row.get("data") {
            Some(Value::String(text)) => serde_json::from_str(text).map_err(|e| {
                MdxdbError::UnexpectedResponseFormat(format!("data column is not JSON: {e}"))
            })?,
            Some(value @ Value::Object(_)) => value.clone(),
            _ => Value::Object(Map::new()),
        };

        let path = string_list(row.get("path"));
        let embedding = match row.get("embedding") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_f64).collect(),
            _ => Vec::new(),
        };

        let sign = column_i64(row, "sign").unwrap_or(1);
        let stored = Self {
            id: column_str(row, "id").to_string(),
            ns: column_str(row, "ns").to_string(),
            collection: column_str(row, "type").to_string(),
            path,
            data,
            content: column_str(row, "content").to_string(),
            embedding,
            ts: column_i64(row, "ts_ms")?,
            hash: column_str(row, "hash").to_string(),
            version: column_u64(row, "version")?,
        };

        let version = stored.version;
        Ok(Versioned::from_sign(stored, version, if sign < 0 { -1 } else { 1 }))
    }

    pub fn into_document(self) -> Result<Document> {
        let mut data = self.data;
        let (host, extra) = match data.as_object_mut().and_then(|d| d.remove(METADATA_KEY)) {
            Some(Value::Object(mut stored)) => {
                let host = match stored.remove("host") {
                    Some(Value::String(host)) => Some(host),
                    _ => None,
                };
                (host, stored)
            }
            _ => (None, Map::new()),
        };
        let data: DocumentData = serde_json::from_value(data).map_err(|e| {
            MdxdbError::UnexpectedResponseFormat(format!("bad data for {}: {e}", self.id))
        })?;

        let mut document = Document {
            id: String::new(),
            content: self.content,
            metadata: DocumentMetadata {
                id: String::new(),
                doc_type: data.doc_type.clone(),
                ts: self.ts,
                ns: non_empty(self.ns),
                host,
                path: (!self.path.is_empty()).then_some(self.path),
                version: Some(self.version),
                hash: non_empty(self.hash),
                extra,
            },
            data,
            embeddings: None,
            collections: Some(vec![self.collection]),
        };
        document.set_id(self.id);
        Ok(document)
    }

    /// `JSONEachRow` object for an insert with the given sign.
    pub fn to_insert(&self, sign: i8) -> Result<Value> {
        let ts = DateTime::from_timestamp_millis(self.ts)
            .ok_or_else(|| {
                MdxdbError::InvalidDocument(format!("timestamp {} out of range", self.ts))
            })?
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        Ok(json!({
            "id": self.id,
            "ns": self.ns,
            "type": self.collection,
            "path": self.path,
            "data": self.data,
            "content": self.content,
            "embedding": self.embedding,
            "ts": ts,
            "hash": self.hash,
            "version": self.version,
            "sign": sign,
        }))
    }
}

/// `data` payload, with `host` and free metadata fields under [`METADATA_KEY`].
fn encode_data(document: &Document) -> Result<Value> {
    let mut data = serde_json::to_value(&document.data)?;
    let mut stored = document.metadata.extra.clone();
    if let Some(host) = &document.metadata.host {
        stored.insert("host".to_string(), Value::String(host.clone()));
    }
    if !stored.is_empty() {
        if let Some(object) = data.as_object_mut() {
            object.insert(METADATA_KEY.to_string(), Value::Object(stored));
        }
    }
    Ok(data)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
