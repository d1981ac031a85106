//! Tests for the reserved-field split of flat backend metadata.

use serde_json::json;
use vecfuse_types::{
    Document, FILE_EXTENSION_KEY, Metadata, RELATIVE_PATH_KEY, START_LINE_KEY, is_reserved_key,
};

fn sample_document() -> Document {
    let mut metadata = Metadata::new();
    metadata.insert("language".to_string(), json!("rust"));
    metadata.insert("hash".to_string(), json!({"algo": "sha256", "len": 64}));
    Document {
        id: "chunk-1".to_string(),
        vector: vec![0.1, 0.2],
        content: "fn main() {}".to_string(),
        relative_path: "src/main.rs".to_string(),
        start_line: 3,
        end_line: 9,
        file_extension: ".rs".to_string(),
        metadata,
    }
}

#[test]
fn test_flat_metadata_contains_reserved_and_residual_keys() {
    let flat = sample_document().to_flat_metadata();
    assert_eq!(flat.len(), 6);
    assert_eq!(flat[RELATIVE_PATH_KEY], "src/main.rs");
    assert_eq!(flat[START_LINE_KEY], 3);
    assert_eq!(flat[FILE_EXTENSION_KEY], ".rs");
    assert_eq!(flat["language"], "rust");
}

#[test]
fn test_split_round_trips_with_insertion_mapping() {
    let doc = sample_document();
    let flat = doc.to_flat_metadata();
    let restored = Document::from_flat_metadata(
        doc.id.clone(),
        doc.content.clone(),
        doc.vector.clone(),
        flat,
    );
    assert_eq!(restored, doc);
}

#[test]
fn test_residual_never_holds_reserved_keys() {
    let mut flat = sample_document().to_flat_metadata();
    flat.insert("extra".to_string(), json!(true));
    let doc = Document::from_flat_metadata("id", "text", Vec::new(), flat);
    assert!(doc.metadata.keys().all(|k| !is_reserved_key(k)));
    assert_eq!(doc.metadata["extra"], true);
}

#[test]
fn test_reserved_field_wins_over_shadowing_residual_key() {
    let mut doc = sample_document();
    doc.metadata
        .insert(RELATIVE_PATH_KEY.to_string(), json!("shadow.rs"));
    let flat = doc.to_flat_metadata();
    assert_eq!(flat[RELATIVE_PATH_KEY], "src/main.rs");
}

#[test]
fn test_missing_reserved_keys_default() {
    let doc = Document::from_flat_metadata("x", "body", Vec::new(), Metadata::new());
    assert_eq!(doc.relative_path, "");
    assert_eq!(doc.start_line, 0);
    assert_eq!(doc.end_line, 0);
    assert_eq!(doc.file_extension, "");
}

#[test]
fn test_document_deserializes_camel_case() {
    let doc: Document = serde_json::from_value(json!({
        "id": "a",
        "content": "text",
        "relativePath": "lib.rs",
        "startLine": 1,
        "endLine": 2,
        "fileExtension": ".rs"
    }))
    .unwrap();
    assert_eq!(doc.relative_path, "lib.rs");
    assert!(doc.vector.is_empty());
    assert!(doc.metadata.is_empty());
}
