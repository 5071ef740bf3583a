//! MDX document files.
//!
//! A document is stored as YAML frontmatter followed by the raw content:
//!
//! ```text
//! ---
//! $id: hello-world
//! $type: Post
//! title: Hello
//! $metadata:
//!   id: hello-world
//!   type: Post
//!   ts: 1700000000000
//!   version: 1
//! ---
//! # Hello
//! ```
//!
//! The frontmatter is the document's `data` with the tracking record under
//! the reserved `$metadata` key. Embeddings live in the sidecar, not here.

use mdxdb_core::{Document, DocumentData, DocumentMetadata, MdxdbError, Result};
use serde_json::{Map, Value};

/// Frontmatter key holding the tracking record.
pub const METADATA_KEY: &str = "$metadata";

const DELIMITER: &str = "---";

/// Render `document` as an MDX file.
pub fn encode(document: &Document) -> Result<String> {
    let Value::Object(mut frontmatter) = serde_json::to_value(&document.data)? else {
        return Err(MdxdbError::InvalidDocument(
            "document data must serialize to a mapping".to_string(),
        ));
    };
    frontmatter.insert(
        METADATA_KEY.to_string(),
        serde_json::to_value(&document.metadata)?,
    );

    let yaml = serde_yaml::to_string(&Value::Object(frontmatter))
        .map_err(|e| MdxdbError::InvalidDocument(format!("cannot render frontmatter: {e}")))?;

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", document.content))
}

/// Parse an MDX file.
///
/// `id` is the identifier the file is stored under and wins over whatever
/// the frontmatter says. `doc_type` is used when the frontmatter has no
/// `$type`. A file without frontmatter is all content.
pub fn decode(text: &str, id: &str, doc_type: &str) -> Result<Document> {
    let Some((yaml, body)) = split_frontmatter(text) else {
        return Ok(Document::new(doc_type, text).with_id(id));
    };

    let mut frontmatter = match parse_yaml(yaml)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(MdxdbError::InvalidDocument(format!(
                "frontmatter of {id} must be a mapping, got {other}"
            )));
        }
    };

    let metadata = frontmatter.remove(METADATA_KEY);
    frontmatter
        .entry("$type")
        .or_insert_with(|| Value::String(doc_type.to_string()));
    frontmatter.insert("$id".to_string(), Value::String(id.to_string()));

    let data: DocumentData = serde_json::from_value(Value::Object(frontmatter))
        .map_err(|e| MdxdbError::InvalidDocument(format!("bad frontmatter in {id}: {e}")))?;

    let mut document = Document::new(data.doc_type.clone(), body);
    if let Some(metadata) = metadata {
        document.metadata = decode_metadata(metadata, &document.metadata, id)?;
    }
    document.data = data;
    document.set_id(id);

    Ok(document)
}

fn decode_metadata(
    value: Value,
    defaults: &DocumentMetadata,
    id: &str,
) -> Result<DocumentMetadata> {
    let Value::Object(mut map) = value else {
        return Err(MdxdbError::InvalidDocument(format!(
            "{METADATA_KEY} of {id} must be a mapping"
        )));
    };

    map.entry("type")
        .or_insert_with(|| Value::String(defaults.doc_type.clone()));
    map.entry("ts").or_insert_with(|| Value::from(defaults.ts));
    map.entry("id")
        .or_insert_with(|| Value::String(id.to_string()));

    serde_json::from_value(Value::Object(map))
        .map_err(|e| MdxdbError::InvalidDocument(format!("bad {METADATA_KEY} in {id}: {e}")))
}

fn parse_yaml(yaml: &str) -> Result<Value> {
    if yaml.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(yaml)
        .map_err(|e| MdxdbError::InvalidDocument(format!("invalid frontmatter: {e}")))
}

/// Split into `(frontmatter, body)` when the text opens with a delimiter line.
fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_encode_decode() {
        let mut document = Document::new("Post", "# Hello\n\nBody text.\n")
            .with_id("hello-world")
            .with_field("title", "Hello")
            .with_field("tags", json!(["a", "b"]))
            .with_namespace("example.com");
        document.metadata.version = Some(3);

        let text = encode(&document).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.ends_with("---\n# Hello\n\nBody text.\n"));

        let decoded = decode(&text, "hello-world", "Unused").unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn test_plain_file_is_all_content() {
        let decoded = decode("# Just markdown\n", "notes", "Document").unwrap();
        assert_eq!(decoded.id, "notes");
        assert_eq!(decoded.content, "# Just markdown\n");
        assert_eq!(decoded.data.doc_type, "Document");
        decoded.validate().unwrap();
    }

    #[test]
    fn test_hand_written_frontmatter() {
        let text = "---\ntitle: Draft\nscore: 4.5\n---\nBody";
        let decoded = decode(text, "draft", "Article").unwrap();

        assert_eq!(decoded.content, "Body");
        assert_eq!(decoded.data.doc_type, "Article");
        assert_eq!(decoded.data.fields["title"], json!("Draft"));
        assert_eq!(decoded.data.fields["score"], json!(4.5));
        assert_eq!(decoded.metadata.doc_type, "Article");
        decoded.validate().unwrap();
    }

    #[test]
    fn test_file_name_wins_over_frontmatter_id() {
        let text = "---\n$id: other\n$type: Post\n$metadata:\n  id: other\n---\n";
        let decoded = decode(text, "real", "Post").unwrap();
        assert_eq!(decoded.id, "real");
        decoded.validate().unwrap();
    }

    #[test]
    fn test_empty_frontmatter() {
        let decoded = decode("---\n---\nBody", "x", "Post").unwrap();
        assert_eq!(decoded.content, "Body");
    }

    #[test]
    fn test_unterminated_frontmatter_is_content() {
        let text = "---\ntitle: x\nno closing line";
        let decoded = decode(text, "x", "Post").unwrap();
        assert_eq!(decoded.content, text);
    }

    #[test]
    fn test_invalid_frontmatter() {
        assert!(matches!(
            decode("---\n- a list\n---\n", "x", "Post"),
            Err(MdxdbError::InvalidDocument(_))
        ));
        assert!(matches!(
            decode("---\ntitle: [unclosed\n---\n", "x", "Post"),
            Err(MdxdbError::InvalidDocument(_))
        ));
    }
}
