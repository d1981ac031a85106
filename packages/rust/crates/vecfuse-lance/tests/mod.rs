//! Tests for vecfuse-lance crate.

use lance::deps::arrow_array::{Array, Int64Array, RecordBatchReader, StringArray};
use vecfuse_lance::{
    DocumentRecordBatchReader, DocumentRow, FILE_EXTENSION_COLUMN, ID_COLUMN, METADATA_COLUMN,
    START_LINE_COLUMN, VECTOR_COLUMN, build_document_batch, column_for_field, extract_i64,
    extract_optional_string, extract_string,
};

fn row(id: &str, vector: Vec<f32>) -> DocumentRow {
    DocumentRow {
        id: id.to_string(),
        vector,
        content: format!("content of {id}"),
        relative_path: format!("src/{id}.rs"),
        start_line: 1,
        end_line: 10,
        file_extension: ".rs".to_string(),
        metadata_json: "{}".to_string(),
    }
}

#[test]
fn test_default_schema() {
    let schema = DocumentRecordBatchReader::default_schema(8).unwrap();
    let fields = schema.fields();

    assert_eq!(fields.len(), 8);
    assert_eq!(fields[0].name(), ID_COLUMN);
    assert_eq!(fields[1].name(), VECTOR_COLUMN);
    assert_eq!(fields[7].name(), METADATA_COLUMN);
}

#[test]
fn test_from_rows() {
    let mut reader = DocumentRecordBatchReader::from_rows(
        vec![row("a", vec![0.1, 0.2, 0.3]), row("b", vec![0.4, 0.5, 0.6])],
        3,
    )
    .unwrap();

    assert_eq!(reader.schema().fields().len(), 8);
    let batch = reader.next().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert!(reader.next().is_none());
}

#[test]
fn test_build_rejects_wrong_dimension() {
    let err = build_document_batch(vec![row("a", vec![0.1, 0.2])], 3).unwrap_err();
    assert!(err.to_string().contains("expected 3"));
}

#[test]
fn test_promoted_columns_hold_values() {
    let batch = build_document_batch(vec![row("a", vec![1.0, 0.0])], 2).unwrap();
    let starts = batch
        .column_by_name(START_LINE_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .unwrap();
    let extensions = batch
        .column_by_name(FILE_EXTENSION_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .unwrap();
    assert_eq!(starts.value(0), 1);
    assert_eq!(extensions.value(0), ".rs");
}

#[test]
fn test_column_for_field() {
    assert_eq!(column_for_field("fileExtension"), Some(FILE_EXTENSION_COLUMN));
    assert_eq!(column_for_field("id"), Some(ID_COLUMN));
    assert_eq!(column_for_field("language"), None);
}

#[test]
fn test_extract_string_null() {
    let array = StringArray::from(vec![Some("hello"), None]);
    assert_eq!(extract_string(&array, 0), "hello");
    assert_eq!(extract_string(&array, 1), "");
    assert!(array.is_null(1));
}

#[test]
fn test_extract_optional_string() {
    let array = StringArray::from(vec![Some("hello"), None]);
    assert_eq!(
        extract_optional_string(Some(&array), 0),
        Some("hello".to_string())
    );
    assert_eq!(extract_optional_string(Some(&array), 1), None);
    assert_eq!(extract_optional_string(None, 0), None);
}

#[test]
fn test_extract_i64() {
    let array = Int64Array::from(vec![Some(7), None]);
    assert_eq!(extract_i64(Some(&array), 0), 7);
    assert_eq!(extract_i64(Some(&array), 1), 0);
    assert_eq!(extract_i64(None, 0), 0);
}
