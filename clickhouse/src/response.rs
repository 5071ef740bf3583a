//! Response normalisation.
//!
//! Depending on the engine and output format, rows come back as a flat
//! list, a list wrapped in one more list, or a `FORMAT JSON` envelope
//! with the rows under `data`. Everything else is rejected.

use mdxdb_core::{MdxdbError, Result};
use serde_json::{Map, Value};

/// A single result row.
pub type RowMap = Map<String, Value>;

/// Flatten an engine response into its rows.
pub fn normalize_rows(response: Value) -> Result<Vec<RowMap>> {
    match response {
        Value::Object(mut envelope) if envelope.contains_key("data") => {
            match envelope.remove("data") {
                Some(Value::Array(items)) => normalize_list(items),
                other => Err(unexpected(&other.unwrap_or_default())),
            }
        }
        Value::Array(items) => normalize_list(items),
        other => Err(unexpected(&other)),
    }
}

fn normalize_list(items: Vec<Value>) -> Result<Vec<RowMap>> {
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(row) => rows.push(row),
            Value::Array(inner) => {
                for value in inner {
                    match value {
                        Value::Object(row) => rows.push(row),
                        other => return Err(unexpected(&other)),
                    }
                }
            }
            other => return Err(unexpected(&other)),
        }
    }
    Ok(rows)
}

fn unexpected(value: &Value) -> MdxdbError {
    let mut shown = value.to_string();
    if shown.len() > 120 {
        let mut end = 120;
        while !shown.is_char_boundary(end) {
            end -= 1;
        }
        shown.truncate(end);
        shown.push_str("...");
    }
    MdxdbError::UnexpectedResponseFormat(format!("expected rows, got {shown}"))
}

/// Read an unsigned integer column. 64-bit integers arrive quoted.
pub fn column_u64(row: &RowMap, column: &str) -> Result<u64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| bad_column(column, row))
}

/// Read a signed integer column. 64-bit integers arrive quoted.
pub fn column_i64(row: &RowMap, column: &str) -> Result<i64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| bad_column(column, row))
}

/// Read a floating point column.
pub fn column_f64(row: &RowMap, column: &str) -> Result<f64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| bad_column(column, row))
}

/// Read a string column; a missing column reads as empty.
pub fn column_str<'a>(row: &'a RowMap, column: &str) -> &'a str {
    row.get(column).and_then(Value::as_str).unwrap_or_default()
}

fn bad_column(column: &str, row: &RowMap) -> MdxdbError {
    MdxdbError::UnexpectedResponseFormat(format!(
        "column {column} missing or mistyped in {}",
        Value::Object(row.clone())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids(rows: &[RowMap]) -> Vec<&str> {
        rows.iter().map(|row| column_str(row, "id")).collect()
    }

    #[test]
    fn test_flat_list() {
        let rows = normalize_rows(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_nested_list() {
        let rows = normalize_rows(json!([[{"id": "a"}, {"id": "b"}], [{"id": "c"}]])).unwrap();
        assert_eq!(ids(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_json_envelope() {
        let rows = normalize_rows(json!({
            "meta": [{"name": "id", "type": "String"}],
            "data": [{"id": "a"}],
            "rows": 1
        }))
        .unwrap();
        assert_eq!(ids(&rows), vec!["a"]);
    }

    #[test]
    fn test_empty() {
        assert!(normalize_rows(json!([])).unwrap().is_empty());
        assert!(normalize_rows(json!({"data": []})).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_other_shapes() {
        for response in [
            json!("text"),
            json!(42),
            json!({"rows": 1}),
            json!({"data": "oops"}),
            json!([1, 2]),
            json!([[[{"id": "too deep"}]]]),
        ] {
            assert!(
                matches!(
                    normalize_rows(response.clone()),
                    Err(MdxdbError::UnexpectedResponseFormat(_))
                ),
                "accepted {response}"
            );
        }
    }

    #[test]
    fn test_columns() {
        let row = json!({"version": "3", "sign": -1, "distance": 0.25, "id": "x"});
        let Value::Object(row) = row else {
            unreachable!()
        };
        assert_eq!(column_u64(&row, "version").unwrap(), 3);
        assert_eq!(column_i64(&row, "sign").unwrap(), -1);
        assert_eq!(column_f64(&row, "distance").unwrap(), 0.25);
        assert_eq!(column_str(&row, "id"), "x");
        assert_eq!(column_str(&row, "missing"), "");
        assert!(column_u64(&row, "id").is_err());
    }
}
