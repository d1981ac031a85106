//! `Lance` `RecordBatch` utilities for vecfuse document tables.
//!
//! One table per collection. The four reserved document fields are stored as
//! Arrow-native columns so they can be filtered without parsing JSON; any
//! other metadata lives in a JSON string column.
//!
//! ```text
//! id | vector | content | relative_path | start_line | end_line | file_extension | metadata
//! ```

use std::sync::Arc;

use lance::deps::arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchReader,
    StringArray,
};
use lance::deps::arrow_schema::{ArrowError, DataType, Field, Schema};

/// ID column name
pub const ID_COLUMN: &str = "id";
/// Vector column name
pub const VECTOR_COLUMN: &str = "vector";
/// Content column name
pub const CONTENT_COLUMN: &str = "content";
/// Relative path column (reserved field `relativePath`)
pub const RELATIVE_PATH_COLUMN: &str = "relative_path";
/// Start line column (reserved field `startLine`)
pub const START_LINE_COLUMN: &str = "start_line";
/// End line column (reserved field `endLine`)
pub const END_LINE_COLUMN: &str = "end_line";
/// File extension column (reserved field `fileExtension`)
pub const FILE_EXTENSION_COLUMN: &str = "file_extension";
/// Residual metadata column (JSON object string)
pub const METADATA_COLUMN: &str = "metadata";
/// Distance column produced by nearest-neighbour scans
pub const DISTANCE_COLUMN: &str = "_distance";
/// Relevance column produced by full-text scans
pub const SCORE_COLUMN: &str = "_score";

/// Columns read back for every hit (everything except the vector).
pub const READ_COLUMNS: [&str; 7] = [
    ID_COLUMN,
    CONTENT_COLUMN,
    RELATIVE_PATH_COLUMN,
    START_LINE_COLUMN,
    END_LINE_COLUMN,
    FILE_EXTENSION_COLUMN,
    METADATA_COLUMN,
];

/// Map a document field name to the column that stores it.
///
/// Returns `None` for keys that only exist inside the JSON metadata column.
#[must_use]
pub fn column_for_field(field: &str) -> Option<&'static str> {
    match field {
        "id" => Some(ID_COLUMN),
        "content" => Some(CONTENT_COLUMN),
        "relativePath" | "relative_path" => Some(RELATIVE_PATH_COLUMN),
        "startLine" | "start_line" => Some(START_LINE_COLUMN),
        "endLine" | "end_line" => Some(END_LINE_COLUMN),
        "fileExtension" | "file_extension" => Some(FILE_EXTENSION_COLUMN),
        _ => None,
    }
}

/// One row of a document table, already split into columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRow {
    /// Document id
    pub id: String,
    /// Embedding
    pub vector: Vec<f32>,
    /// Chunk text
    pub content: String,
    /// `relativePath`
    pub relative_path: String,
    /// `startLine`
    pub start_line: i64,
    /// `endLine`
    pub end_line: i64,
    /// `fileExtension`
    pub file_extension: String,
    /// Residual metadata serialized as a JSON object
    pub metadata_json: String,
}

/// A record batch reader over document rows.
pub struct DocumentRecordBatchReader {
    schema: Arc<Schema>,
    batches: Vec<RecordBatch>,
    current_batch: usize,
}

impl DocumentRecordBatchReader {
    /// Create a new reader from prepared batches.
    #[must_use]
    pub fn new(schema: Arc<Schema>, batches: Vec<RecordBatch>) -> Self {
        Self {
            schema,
            batches,
            current_batch: 0,
        }
    }

    /// Create a reader holding a single batch built from `rows`.
    ///
    /// # Errors
    ///
    /// Returns an error when:
    /// - `dimension` cannot be represented as `i32`.
    /// - A row vector does not have `dimension` elements.
    /// - Arrow array or `RecordBatch` construction fails.
    pub fn from_rows(rows: Vec<DocumentRow>, dimension: usize) -> Result<Self, ArrowError> {
        let batch = build_document_batch(rows, dimension)?;
        Ok(Self::new(batch.schema(), vec![batch]))
    }

    /// Get the document table schema.
    ///
    /// # Errors
    ///
    /// Returns an error when `dimension` cannot be represented as `i32`.
    pub fn default_schema(dimension: usize) -> Result<Arc<Schema>, ArrowError> {
        let dimension_i32 = dimension_to_i32(dimension)?;
        Ok(Arc::new(Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension_i32,
                ),
                false,
            ),
            Field::new(CONTENT_COLUMN, DataType::Utf8, false),
            Field::new(RELATIVE_PATH_COLUMN, DataType::Utf8, false),
            Field::new(START_LINE_COLUMN, DataType::Int64, false),
            Field::new(END_LINE_COLUMN, DataType::Int64, false),
            Field::new(FILE_EXTENSION_COLUMN, DataType::Utf8, false),
            Field::new(METADATA_COLUMN, DataType::Utf8, true),
        ])))
    }
}

impl Iterator for DocumentRecordBatchReader {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.batches.get(self.current_batch)?.clone();
        self.current_batch += 1;
        Some(Ok(batch))
    }
}

impl RecordBatchReader for DocumentRecordBatchReader {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }
}

/// Build one `RecordBatch` in the document table layout.
///
/// # Errors
///
/// Same conditions as [`DocumentRecordBatchReader::from_rows`].
pub fn build_document_batch(
    rows: Vec<DocumentRow>,
    dimension: usize,
) -> Result<RecordBatch, ArrowError> {
    let schema = DocumentRecordBatchReader::default_schema(dimension)?;
    let dimension_i32 = dimension_to_i32(dimension)?;

    let mut ids = Vec::with_capacity(rows.len());
    let mut flat_values = Vec::with_capacity(rows.len() * dimension);
    let mut contents = Vec::with_capacity(rows.len());
    let mut paths = Vec::with_capacity(rows.len());
    let mut starts = Vec::with_capacity(rows.len());
    let mut ends = Vec::with_capacity(rows.len());
    let mut extensions = Vec::with_capacity(rows.len());
    let mut metadatas = Vec::with_capacity(rows.len());

    for row in rows {
        if row.vector.len() != dimension {
            return Err(ArrowError::InvalidArgumentError(format!(
                "vector for '{}' has {} elements, expected {dimension}",
                row.id,
                row.vector.len()
            )));
        }
        ids.push(row.id);
        flat_values.extend(row.vector);
        contents.push(row.content);
        paths.push(row.relative_path);
        starts.push(row.start_line);
        ends.push(row.end_line);
        extensions.push(row.file_extension);
        metadatas.push(row.metadata_json);
    }

    let vector_array = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension_i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(paths)),
            Arc::new(Int64Array::from(starts)),
            Arc::new(Int64Array::from(ends)),
            Arc::new(StringArray::from(extensions)),
            Arc::new(StringArray::from(metadatas)),
        ],
    )
}

/// Extract string values from a `StringArray` at a specific index.
#[must_use]
pub fn extract_string(array: &StringArray, index: usize) -> String {
    if array.is_null(index) {
        String::new()
    } else {
        array.value(index).to_string()
    }
}

/// Extract optional string from a nullable column.
#[must_use]
pub fn extract_optional_string(array: Option<&StringArray>, index: usize) -> Option<String> {
    array.and_then(|arr| {
        if arr.is_null(index) {
            None
        } else {
            Some(arr.value(index).to_string())
        }
    })
}

/// Extract an `i64` from an optional `Int64Array`, `0` when absent or null.
#[must_use]
pub fn extract_i64(array: Option<&Int64Array>, index: usize) -> i64 {
    array
        .filter(|arr| !arr.is_null(index))
        .map_or(0, |arr| arr.value(index))
}

fn dimension_to_i32(dimension: usize) -> Result<i32, ArrowError> {
    i32::try_from(dimension).map_err(|_| {
        ArrowError::InvalidArgumentError(format!(
            "embedding dimension {dimension} exceeds i32::MAX"
        ))
    })
}
