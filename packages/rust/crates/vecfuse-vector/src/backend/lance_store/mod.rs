//! Embedded Lance backend: one dataset per collection under a base directory.
//!
//! ```text
//! <base>/
//! ├── code_chunks.lance
//! └── docs.lance
//! ```
//!
//! Vectors are L2-normalized before they are written so that Lance's squared
//! L2 distance halves to cosine distance at query time.

mod search;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use lance::dataset::{Dataset, MergeInsertBuilder, WhenMatched, WhenNotMatched, WriteParams};
use lance::deps::arrow_array::{RecordBatch, RecordBatchIterator};
use lance::deps::arrow_schema::DataType;
use lance_index::IndexType;
use lance_index::scalar::inverted::tokenizer::InvertedIndexParams;
use lance_index::traits::DatasetIndexExt;
use tokio::sync::Mutex;
use vecfuse_lance::{
    CONTENT_COLUMN, DocumentRecordBatchReader, DocumentRow, ID_COLUMN, VECTOR_COLUMN,
    build_document_batch,
};
use vecfuse_types::{Document, Metadata};

use super::{BackendStore, StoredHit, StoredRecord};
use crate::VectorStoreError;
use crate::error::ArrowError;
use crate::filter::Predicate;

const FTS_INDEX_NAME: &str = "content_fts";

/// Backend storing each collection as a Lance dataset on local disk.
#[derive(Clone)]
pub struct LanceBackend {
    base_path: PathBuf,
    /// Shared dataset cache to avoid reopening tables
    datasets: Arc<Mutex<DashMap<String, Dataset>>>,
}

impl LanceBackend {
    /// Open (or create) a backend rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VectorStoreError> {
        let base_path = path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_path).await?;
        log::debug!("Lance backend rooted at {}", base_path.display());
        Ok(Self {
            base_path,
            datasets: Arc::new(Mutex::new(DashMap::new())),
        })
    }

    /// Base directory holding the `.lance` datasets.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}.lance"))
    }

    async fn cache(&self, name: &str, dataset: Dataset) {
        let datasets = self.datasets.lock().await;
        datasets.insert(name.to_string(), dataset);
    }

    /// Cached handle, or a freshly opened dataset.
    async fn open_dataset(&self, name: &str) -> Result<Dataset, VectorStoreError> {
        {
            let datasets = self.datasets.lock().await;
            if let Some(cached) = datasets.get(name) {
                return Ok(cached.clone());
            }
        }
        let table_path = self.table_path(name);
        if !table_path.exists() {
            return Err(VectorStoreError::CollectionNotFound(name.to_string()));
        }
        let dataset = Dataset::open(table_path.to_string_lossy().as_ref()).await?;
        self.cache(name, dataset.clone()).await;
        Ok(dataset)
    }
}

async fn rebuild_fts_index(name: &str, dataset: &mut Dataset) -> Result<(), VectorStoreError> {
    let params = InvertedIndexParams::default();
    dataset
        .create_index(
            &[CONTENT_COLUMN],
            IndexType::Inverted,
            Some(FTS_INDEX_NAME.to_string()),
            &params,
            true,
        )
        .await?;
    log::debug!("Rebuilt full-text index for '{name}'");
    Ok(())
}

/// Dimension of the vector column.
fn dataset_dimension(dataset: &Dataset) -> Result<usize, VectorStoreError> {
    let schema = lance::deps::arrow_schema::Schema::from(dataset.schema());
    let field = schema.field_with_name(VECTOR_COLUMN)?;
    match field.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size)
            .map_err(|_| VectorStoreError::General(format!("invalid vector size {size}"))),
        other => Err(VectorStoreError::General(format!(
            "vector column has unexpected type {other:?}"
        ))),
    }
}

/// Scale to unit length. Zero vectors are returned unchanged.
fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector.to_vec()
    } else {
        vector.iter().map(|x| x / norm).collect()
    }
}

fn to_row(record: &StoredRecord) -> Result<DocumentRow, VectorStoreError> {
    let document = Document::from_flat_metadata(
        record.id.clone(),
        record.content.clone(),
        normalize(&record.vector),
        record.metadata.clone(),
    );
    Ok(DocumentRow {
        id: document.id,
        vector: document.vector,
        content: document.content,
        relative_path: document.relative_path,
        start_line: document.start_line,
        end_line: document.end_line,
        file_extension: document.file_extension,
        metadata_json: serde_json::to_string(&document.metadata)?,
    })
}

/// Later records win when the same id appears twice in one batch.
fn dedup_by_id(records: &[StoredRecord]) -> Vec<&StoredRecord> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&StoredRecord> = Vec::with_capacity(records.len());
    for record in records {
        match position.get(record.id.as_str()) {
            Some(&idx) => unique[idx] = record,
            None => {
                position.insert(record.id.as_str(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

#[async_trait]
impl BackendStore for LanceBackend {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<(), VectorStoreError> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidEmbeddingDimension);
        }
        let table_path = self.table_path(name);
        if table_path.exists() {
            return Ok(());
        }
        let schema = DocumentRecordBatchReader::default_schema(dimension)?;
        let batches: Vec<Result<RecordBatch, ArrowError>> =
            vec![Ok(RecordBatch::new_empty(schema.clone()))];
        let iter = RecordBatchIterator::new(batches, schema);
        let dataset = Dataset::write(
            Box::new(iter),
            table_path.to_string_lossy().as_ref(),
            Some(WriteParams::default()),
        )
        .await?;
        log::info!("Created collection '{name}' (dimension {dimension})");
        self.cache(name, dataset).await;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        {
            let datasets = self.datasets.lock().await;
            datasets.remove(name);
        }
        let table_path = self.table_path(name);
        if table_path.exists() {
            tokio::fs::remove_dir_all(&table_path).await?;
            log::info!("Dropped collection '{name}'");
        }
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        Ok(self.table_path(name).exists())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_string_lossy().strip_suffix(".lance") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn insert(
        &self,
        collection: &str,
        records: &[StoredRecord],
    ) -> Result<(), VectorStoreError> {
        let dataset = self.open_dataset(collection).await?;
        if records.is_empty() {
            return Ok(());
        }
        let dimension = dataset_dimension(&dataset)?;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(VectorStoreError::InvalidDimension {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        let rows = dedup_by_id(records)
            .into_iter()
            .map(to_row)
            .collect::<Result<Vec<_>, _>>()?;
        let batch = build_document_batch(rows, dimension)?;
        let schema = batch.schema();
        let source_batches: Vec<Result<RecordBatch, ArrowError>> = vec![Ok(batch)];
        let source = Box::new(RecordBatchIterator::new(source_batches, schema));

        let mut builder =
            MergeInsertBuilder::try_new(Arc::new(dataset), vec![ID_COLUMN.to_string()])?;
        builder
            .when_matched(WhenMatched::UpdateAll)
            .when_not_matched(WhenNotMatched::InsertAll);
        let job = builder.try_build()?;
        let (updated, stats) = job.execute_reader(source).await?;
        log::debug!(
            "Upserted into '{collection}': {} inserted, {} updated",
            stats.num_inserted_rows,
            stats.num_updated_rows
        );

        let mut updated = updated.as_ref().clone();
        rebuild_fts_index(collection, &mut updated).await?;
        self.cache(collection, updated).await;
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut dataset = self.open_dataset(collection).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let filter = crate::filter::json_to_lance_where(
            &Predicate::new_in(ID_COLUMN, ids.iter().cloned()).to_json(),
        );
        dataset.delete(&filter).await?;
        self.cache(collection, dataset).await;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let dataset = self.open_dataset(collection).await?;
        search::scan_rows(&dataset, predicate, limit).await
    }

    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        predicate: Option<&Predicate>,
        params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let dataset = self.open_dataset(collection).await?;
        let dimension = dataset_dimension(&dataset)?;
        if vector.len() != dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: dimension,
                actual: vector.len(),
            });
        }
        search::nearest(&dataset, vector, limit, predicate, params).await
    }

    async fn search_lexical(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
        predicate: Option<&Predicate>,
        params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let dataset = self.open_dataset(collection).await?;
        search::full_text(&dataset, text, limit, predicate, params).await
    }
}
