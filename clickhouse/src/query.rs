//! SQL builders.
//!
//! Identifiers (the database name) are validated and interpolated; every
//! value travels as a typed `{name:Type}` parameter.

use serde_json::{Map, Value};

use crate::row::{INSERT_COLUMNS, SELECT_COLUMNS};
use crate::schema::{DATA_TABLE, LATEST_VIEW};

/// A statement and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Map<String, Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Map::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

fn scoped(sql: String, ns: &str, collection: &str) -> Query {
    Query::new(sql)
        .bind("ns", ns)
        .bind("collection", collection)
}

const SCOPE: &str = "ns = {ns:String} AND type = {collection:String}";

/// Every live document of a collection.
pub fn select_latest(database: &str, ns: &str, collection: &str) -> Query {
    scoped(
        format!("SELECT {SELECT_COLUMNS} FROM {database}.{LATEST_VIEW} WHERE {SCOPE}"),
        ns,
        collection,
    )
}

/// Every row ever written for one document, tombstones included.
pub fn select_history(database: &str, ns: &str, collection: &str, id: &str) -> Query {
    scoped(
        format!(
            "SELECT {SELECT_COLUMNS} FROM {database}.{DATA_TABLE} WHERE {SCOPE} AND id = {{id:String}}"
        ),
        ns,
        collection,
    )
    .bind("id", id)
}

/// Nearest neighbours by cosine distance.
///
/// Keeps rows with `distance <= 1 - threshold`, closest first.
pub fn vector_search(
    database: &str,
    ns: &str,
    collection: &str,
    vector: &[f64],
    threshold: f64,
    limit: Option<usize>,
) -> Query {
    let mut sql = format!(
        "SELECT {SELECT_COLUMNS}, cosineDistance(embedding, {{vector:Array(Float32)}}) AS distance \
         FROM {database}.{LATEST_VIEW} \
         WHERE {SCOPE} AND distance <= {{max_distance:Float64}} \
         ORDER BY distance ASC"
    );
    if limit.is_some() {
        sql.push_str(" LIMIT {limit:UInt64}");
    }

    let mut query = scoped(sql, ns, collection)
        .bind("vector", vector.to_vec())
        .bind("max_distance", 1.0 - threshold);
    if let Some(limit) = limit {
        query = query.bind("limit", limit);
    }
    query
}

/// Case-insensitive substring match on `content`.
pub fn text_search(
    database: &str,
    ns: &str,
    collection: &str,
    text: &str,
    limit: Option<usize>,
) -> Query {
    let mut sql = format!(
        "SELECT {SELECT_COLUMNS} FROM {database}.{LATEST_VIEW} \
         WHERE {SCOPE} AND content ILIKE {{pattern:String}}"
    );
    if limit.is_some() {
        sql.push_str(" LIMIT {limit:UInt64}");
    }

    let mut query = scoped(sql, ns, collection).bind("pattern", format!("%{}%", escape_like(text)));
    if let Some(limit) = limit {
        query = query.bind("limit", limit);
    }
    query
}

/// Names of collections with at least one live document.
pub fn list_collections(database: &str, ns: &str) -> Query {
    Query::new(format!(
        "SELECT DISTINCT type AS name FROM {database}.{LATEST_VIEW} WHERE ns = {{ns:String}} ORDER BY name"
    ))
    .bind("ns", ns)
}

/// `INSERT ... FORMAT JSONEachRow` with the rows inline.
pub fn insert_rows(database: &str, rows: &[Value]) -> String {
    let mut sql = format!("INSERT INTO {database}.{DATA_TABLE} ({INSERT_COLUMNS}) FORMAT JSONEachRow");
    for row in rows {
        sql.push('\n');
        sql.push_str(&row.to_string());
    }
    sql
}

/// Make `%`, `_` and `\` match literally in a LIKE pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_vector_search_query() {
        let query = vector_search("mdxdb", "example.com", "posts", &[0.5, 0.25], 0.75, Some(5));

        assert!(query.sql.contains(
            "cosineDistance(embedding, {vector:Array(Float32)}) AS distance FROM mdxdb.data_latest"
        ));
        assert!(query.sql.contains("distance <= {max_distance:Float64}"));
        assert!(query.sql.ends_with("ORDER BY distance ASC LIMIT {limit:UInt64}"));
        assert_eq!(query.params["vector"], json!([0.5, 0.25]));
        assert_eq!(query.params["max_distance"], json!(0.25));
        assert_eq!(query.params["limit"], json!(5));
        assert_eq!(query.params["collection"], json!("posts"));
    }

    #[test]
    fn test_vector_search_without_limit() {
        let query = vector_search("mdxdb", "ns", "posts", &[1.0], 0.0, None);
        assert!(query.sql.ends_with("ORDER BY distance ASC"));
        assert!(!query.params.contains_key("limit"));
        assert_eq!(query.params["max_distance"], json!(1.0));
    }

    #[test]
    fn test_text_search_escapes_pattern() {
        let query = text_search("mdxdb", "ns", "posts", "100%_done", None);
        assert!(query.sql.contains("content ILIKE {pattern:String}"));
        assert_eq!(query.params["pattern"], json!("%100\\%\\_done%"));
    }

    #[test]
    fn test_history_reads_base_table() {
        let query = select_history("mdxdb", "ns", "posts", "a");
        assert!(query.sql.contains("FROM mdxdb.data WHERE"));
        assert!(query.sql.contains("id = {id:String}"));
        assert_eq!(query.params["id"], json!("a"));
    }

    #[test]
    fn test_insert_rows() {
        let sql = insert_rows("mdxdb", &[json!({"id": "a"}), json!({"id": "b"})]);
        let lines: Vec<&str> = sql.lines().collect();
        assert_eq!(
            lines,
            vec![
                "INSERT INTO mdxdb.data (id, ns, type, path, data, content, embedding, ts, hash, version, sign) FORMAT JSONEachRow",
                r#"{"id":"a"}"#,
                r#"{"id":"b"}"#,
            ]
        );
    }
}
