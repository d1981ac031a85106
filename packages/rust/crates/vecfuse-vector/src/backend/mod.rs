//! Backend store contract and its implementations.
//!
//! The fusion core only ever talks to a [`BackendStore`]. Two stores ship
//! with the crate: [`LanceBackend`] (embedded Lance datasets on disk) and
//! [`MemoryBackend`] (process-local, used for tests and throwaway sessions).

mod lance_store;
mod memory;

pub use lance_store::LanceBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vecfuse_types::{Document, Metadata};

use crate::VectorStoreError;
use crate::filter::Predicate;

/// Search parameter: over-fetch factor when a predicate cannot be pushed down.
pub const FETCH_MULTIPLIER_PARAM: &str = "fetch_multiplier";

/// Default over-fetch factor for post-scan filtering.
pub const DEFAULT_FETCH_MULTIPLIER: usize = 2;

/// A document as written to the backend: reserved fields live in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Document id
    pub id: String,
    /// Embedding
    pub vector: Vec<f32>,
    /// Chunk text
    pub content: String,
    /// Flat mapping of reserved and caller keys
    pub metadata: Metadata,
}

impl From<&Document> for StoredRecord {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            vector: document.vector.clone(),
            content: document.content.clone(),
            metadata: document.to_flat_metadata(),
        }
    }
}

/// One row returned by a backend call. Lower `raw_distance` is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHit {
    /// Document id
    pub id: String,
    /// Backend-native distance
    pub raw_distance: f64,
    /// Chunk text
    pub content: String,
    /// Flat mapping of reserved and caller keys
    pub metadata: Metadata,
}

impl StoredHit {
    /// Split the flat mapping back into a [`Document`] (vector left empty).
    #[must_use]
    pub fn into_document(self) -> Document {
        Document::from_flat_metadata(self.id, self.content, Vec::new(), self.metadata)
    }
}

/// Call contract of a vector collection backend.
///
/// Implementations own all durable state. Collection names are opaque
/// strings; a call naming a missing collection returns
/// [`VectorStoreError::CollectionNotFound`] unless documented otherwise.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Create an empty collection. Existing collections are left untouched.
    async fn create_collection(&self, name: &str, dimension: usize)
    -> Result<(), VectorStoreError>;

    /// Remove a collection and its documents. Missing collections are ignored.
    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError>;

    /// Whether the collection exists.
    async fn has_collection(&self, name: &str) -> Result<bool, VectorStoreError>;

    /// Collection names, sorted.
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError>;

    /// Upsert records by id.
    async fn insert(&self, collection: &str, records: &[StoredRecord])
    -> Result<(), VectorStoreError>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorStoreError>;

    /// Metadata retrieval without similarity ranking.
    async fn query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredHit>, VectorStoreError>;

    /// Nearest-neighbour search by embedding.
    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        predicate: Option<&Predicate>,
        params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError>;

    /// Backend-native text similarity search.
    async fn search_lexical(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
        predicate: Option<&Predicate>,
        params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError>;
}

/// Read a positive integer parameter, ignoring other shapes.
#[must_use]
pub fn param_usize(params: &Metadata, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
}
