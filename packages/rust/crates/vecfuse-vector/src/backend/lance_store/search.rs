//! Scanner construction and row decoding for Lance collections.

use futures::TryStreamExt;
use lance::dataset::Dataset;
use lance::dataset::scanner::Scanner;
use lance::deps::arrow_array::{
    Array, ArrayRef, Float32Array, Float64Array, Int64Array, RecordBatch, StringArray,
};
use lance_index::scalar::FullTextSearchQuery;
use serde_json::{Value, json};
use vecfuse_lance::{
    CONTENT_COLUMN, DISTANCE_COLUMN, END_LINE_COLUMN, FILE_EXTENSION_COLUMN, ID_COLUMN,
    METADATA_COLUMN, READ_COLUMNS, RELATIVE_PATH_COLUMN, SCORE_COLUMN, START_LINE_COLUMN,
    VECTOR_COLUMN, column_for_field, extract_i64, extract_optional_string, extract_string,
};
use vecfuse_types::{END_LINE_KEY, FILE_EXTENSION_KEY, Metadata, RELATIVE_PATH_KEY, START_LINE_KEY};

use super::normalize;
use crate::VectorStoreError;
use crate::backend::{DEFAULT_FETCH_MULTIPLIER, FETCH_MULTIPLIER_PARAM, StoredHit, param_usize};
use crate::filter::{Predicate, json_to_lance_where};
use crate::search::relevance_to_distance;

/// Where a predicate is evaluated.
enum FilterPlan<'a> {
    Unfiltered,
    /// SQL `WHERE` handed to the scanner
    Pushdown(String),
    /// Checked on the decoded flat metadata after the scan
    PostScan(&'a Predicate),
}

impl<'a> FilterPlan<'a> {
    fn new(predicate: Option<&'a Predicate>) -> Self {
        let Some(predicate) = predicate else {
            return Self::Unfiltered;
        };
        match column_for_field(&predicate.field) {
            Some(column) => Self::Pushdown(pushdown_clause(predicate, column)),
            None => Self::PostScan(predicate),
        }
    }

    /// Rows to request from the scanner for `limit` results.
    fn fetch_count(&self, limit: usize, params: &Metadata) -> usize {
        match self {
            Self::PostScan(_) => {
                let multiplier =
                    param_usize(params, FETCH_MULTIPLIER_PARAM).unwrap_or(DEFAULT_FETCH_MULTIPLIER);
                limit.saturating_mul(multiplier).max(limit + 10)
            }
            _ => limit,
        }
    }

    fn apply(&self, scanner: &mut Scanner) -> Result<(), VectorStoreError> {
        if let Self::Pushdown(filter) = self {
            scanner.filter(filter)?;
        }
        Ok(())
    }

    fn keep(&self, hit: &StoredHit) -> bool {
        match self {
            Self::PostScan(predicate) => predicate.matches(&hit.metadata),
            _ => true,
        }
    }
}

/// Render an `IN` filter on a promoted column. Line columns are integers, so
/// values that do not parse as integers can never match and are dropped.
fn pushdown_clause(predicate: &Predicate, column: &str) -> String {
    let values: Vec<Value> = if column == START_LINE_COLUMN || column == END_LINE_COLUMN {
        predicate
            .values
            .iter()
            .filter_map(|v| v.trim().parse::<i64>().ok())
            .map(Value::from)
            .collect()
    } else {
        predicate.values.iter().cloned().map(Value::String).collect()
    };
    let mut expr = Metadata::new();
    expr.insert(column.to_string(), json!({ "in": values }));
    json_to_lance_where(&Value::Object(expr))
}

/// How the per-row distance is derived.
#[derive(Clone, Copy)]
enum DistanceSource {
    /// Plain scan: every row is an exact match
    Zero,
    /// Squared L2 between unit vectors, halved to cosine distance
    Vector,
    /// Zero query vector: equally far from everything
    Unit,
    /// BM25 relevance, mapped with `1 / (1 + score)`
    FullText,
}

fn to_limit(n: usize) -> Option<i64> {
    Some(i64::try_from(n).unwrap_or(i64::MAX))
}

async fn is_empty(dataset: &Dataset) -> Result<bool, VectorStoreError> {
    Ok(dataset.count_rows(None).await? == 0)
}

pub(super) async fn nearest(
    dataset: &Dataset,
    vector: &[f32],
    limit: usize,
    predicate: Option<&Predicate>,
    params: &Metadata,
) -> Result<Vec<StoredHit>, VectorStoreError> {
    if limit == 0 || is_empty(dataset).await? {
        return Ok(Vec::new());
    }
    let plan = FilterPlan::new(predicate);
    let fetch_count = plan.fetch_count(limit, params);
    let query = normalize(vector);
    let source = if query.iter().all(|x| *x == 0.0) {
        DistanceSource::Unit
    } else {
        DistanceSource::Vector
    };
    let query_arr = Float32Array::from(query);

    let mut scanner = dataset.scan();
    scanner.project(&READ_COLUMNS)?;
    scanner.nearest(VECTOR_COLUMN, &query_arr, fetch_count)?;
    if matches!(plan, FilterPlan::Pushdown(_)) {
        scanner.prefilter(true);
    }
    plan.apply(&mut scanner)?;
    scanner.limit(to_limit(fetch_count), None)?;

    let hits = collect(scanner, source, &plan).await?;
    Ok(rank(hits, limit))
}

pub(super) async fn full_text(
    dataset: &Dataset,
    text: &str,
    limit: usize,
    predicate: Option<&Predicate>,
    params: &Metadata,
) -> Result<Vec<StoredHit>, VectorStoreError> {
    if text.trim().is_empty() || limit == 0 || is_empty(dataset).await? {
        return Ok(Vec::new());
    }
    let plan = FilterPlan::new(predicate);
    let fetch_count = plan.fetch_count(limit, params);

    let mut scanner = dataset.scan();
    scanner.project(&READ_COLUMNS)?;
    scanner.full_text_search(FullTextSearchQuery::new(text.to_string()))?;
    if matches!(plan, FilterPlan::Pushdown(_)) {
        scanner.prefilter(true);
    }
    plan.apply(&mut scanner)?;
    scanner.limit(to_limit(fetch_count), None)?;

    let hits = collect(scanner, DistanceSource::FullText, &plan).await?;
    Ok(rank(hits, limit))
}

pub(super) async fn scan_rows(
    dataset: &Dataset,
    predicate: Option<&Predicate>,
    limit: Option<usize>,
) -> Result<Vec<StoredHit>, VectorStoreError> {
    let plan = FilterPlan::new(predicate);
    let mut scanner = dataset.scan();
    scanner.project(&READ_COLUMNS)?;
    plan.apply(&mut scanner)?;
    if let (Some(limit), false) = (limit, matches!(plan, FilterPlan::PostScan(_))) {
        scanner.limit(to_limit(limit), None)?;
    }
    let mut hits = collect(scanner, DistanceSource::Zero, &plan).await?;
    if let Some(limit) = limit {
        hits.truncate(limit);
    }
    Ok(hits)
}

/// Stable ascending sort by distance, then truncate.
fn rank(mut hits: Vec<StoredHit>, limit: usize) -> Vec<StoredHit> {
    hits.sort_by(|a, b| a.raw_distance.total_cmp(&b.raw_distance));
    hits.truncate(limit);
    hits
}

async fn collect(
    scanner: Scanner,
    source: DistanceSource,
    plan: &FilterPlan<'_>,
) -> Result<Vec<StoredHit>, VectorStoreError> {
    let mut stream = scanner.try_into_stream().await?;
    let mut hits = Vec::new();
    while let Some(batch) = stream.try_next().await? {
        hits.extend(
            decode_batch(&batch, source)?
                .into_iter()
                .filter(|hit| plan.keep(hit)),
        );
    }
    Ok(hits)
}

fn string_column<'b>(
    batch: &'b RecordBatch,
    name: &str,
) -> Result<&'b StringArray, VectorStoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| VectorStoreError::General(format!("{name} column not found")))
}

fn optional_strings<'b>(batch: &'b RecordBatch, name: &str) -> Option<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn optional_ints<'b>(batch: &'b RecordBatch, name: &str) -> Option<&'b Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
}

fn float_at(column: Option<&ArrayRef>, index: usize) -> Option<f64> {
    let column = column?;
    if let Some(arr) = column.as_any().downcast_ref::<Float32Array>() {
        Some(f64::from(arr.value(index)))
    } else {
        column
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|arr| arr.value(index))
    }
}

fn decode_batch(
    batch: &RecordBatch,
    source: DistanceSource,
) -> Result<Vec<StoredHit>, VectorStoreError> {
    let ids = string_column(batch, ID_COLUMN)?;
    let contents = string_column(batch, CONTENT_COLUMN)?;
    let paths = optional_strings(batch, RELATIVE_PATH_COLUMN);
    let extensions = optional_strings(batch, FILE_EXTENSION_COLUMN);
    let metadatas = optional_strings(batch, METADATA_COLUMN);
    let starts = optional_ints(batch, START_LINE_COLUMN);
    let ends = optional_ints(batch, END_LINE_COLUMN);
    let distances = batch.column_by_name(DISTANCE_COLUMN);
    let scores = batch.column_by_name(SCORE_COLUMN);

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let id = extract_string(ids, i);
        let mut metadata: Metadata = match extract_optional_string(metadatas, i) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable metadata for '{id}': {err}");
                Metadata::new()
            }),
            None => Metadata::new(),
        };
        metadata.insert(
            RELATIVE_PATH_KEY.to_string(),
            Value::String(extract_optional_string(paths, i).unwrap_or_default()),
        );
        metadata.insert(START_LINE_KEY.to_string(), Value::from(extract_i64(starts, i)));
        metadata.insert(END_LINE_KEY.to_string(), Value::from(extract_i64(ends, i)));
        metadata.insert(
            FILE_EXTENSION_KEY.to_string(),
            Value::String(extract_optional_string(extensions, i).unwrap_or_default()),
        );

        let raw_distance = match source {
            DistanceSource::Zero => 0.0,
            DistanceSource::Unit => 1.0,
            DistanceSource::Vector => float_at(distances, i).map_or(1.0, |d| d / 2.0),
            DistanceSource::FullText => float_at(scores, i).map_or(1.0, relevance_to_distance),
        };
        hits.push(StoredHit {
            id,
            raw_distance,
            content: extract_string(contents, i),
            metadata,
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushdown_for_promoted_fields() {
        let predicate = Predicate::new_in("fileExtension", [".rs", ".py"]);
        let plan = FilterPlan::new(Some(&predicate));
        assert!(
            matches!(&plan, FilterPlan::Pushdown(sql) if sql == "file_extension IN ('.rs', '.py')")
        );
        assert_eq!(plan.fetch_count(5, &Metadata::new()), 5);
    }

    #[test]
    fn test_line_values_render_as_integers() {
        let predicate = Predicate::new_in("startLine", ["10", "x"]);
        assert_eq!(pushdown_clause(&predicate, START_LINE_COLUMN), "start_line IN (10)");
    }

    #[test]
    fn test_other_keys_filter_after_scan() {
        let predicate = Predicate::new_in("language", ["rust"]);
        let plan = FilterPlan::new(Some(&predicate));
        assert!(matches!(plan, FilterPlan::PostScan(_)));
        assert_eq!(plan.fetch_count(5, &Metadata::new()), 15);

        let mut params = Metadata::new();
        params.insert(FETCH_MULTIPLIER_PARAM.to_string(), json!(10));
        assert_eq!(plan.fetch_count(5, &params), 50);
    }
}
