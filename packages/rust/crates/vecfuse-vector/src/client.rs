//! Two-phase client lifecycle.
//!
//! [`VectorClient::new`] only validates configuration. [`VectorClient::connect`]
//! opens the backend and hands back a [`ReadyClient`]; every data operation
//! lives on the ready handle, so there is no "not yet initialized" state to
//! check at call time.

use std::path::PathBuf;
use std::sync::Arc;

use vecfuse_types::{
    Document, FilterFallback, FusedResult, FusionOptions, ScoredResult, SearchRequest,
};

use crate::VectorStoreError;
use crate::backend::{BackendStore, LanceBackend, MemoryBackend, StoredRecord};
use crate::filter::{FilterTranslator, Predicate};
use crate::fusion::{FusionEngine, FusionPolicy};
use crate::search::run_modality;

/// Which backend a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded Lance datasets under `path`
    Lance {
        /// Base directory
        path: PathBuf,
    },
    /// Process-local store
    Memory,
}

/// Everything a client needs before it connects.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend selection
    pub backend: BackendKind,
    /// Embedding dimension for collections created through the client
    pub dimension: usize,
    /// Policy for unparseable filters on `query`, `search` and on
    /// `hybrid_search` calls whose options leave the policy unset
    pub filter_fallback: FilterFallback,
    /// Fusion engine behaviour
    pub fusion: FusionPolicy,
    /// Extensions of the default predicate
    pub default_extensions: Vec<String>,
}

impl ClientConfig {
    /// In-memory configuration with defaults.
    #[must_use]
    pub fn memory(dimension: usize) -> Self {
        Self::with_backend(BackendKind::Memory, dimension)
    }

    /// Lance configuration with defaults.
    #[must_use]
    pub fn lance(path: impl Into<PathBuf>, dimension: usize) -> Self {
        Self::with_backend(BackendKind::Lance { path: path.into() }, dimension)
    }

    fn with_backend(backend: BackendKind, dimension: usize) -> Self {
        Self {
            backend,
            dimension,
            filter_fallback: FilterFallback::default(),
            fusion: FusionPolicy::default(),
            default_extensions: crate::filter::DEFAULT_FILE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Set the fusion policy.
    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionPolicy) -> Self {
        self.fusion = fusion;
        self
    }

    /// Set the filter fallback for every search entry point.
    #[must_use]
    pub fn with_filter_fallback(mut self, fallback: FilterFallback) -> Self {
        self.filter_fallback = fallback;
        self
    }

    fn validate(&self) -> Result<(), VectorStoreError> {
        if self.dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "dimension must be positive".to_string(),
            ));
        }
        if let BackendKind::Lance { path } = &self.backend
            && path.as_os_str().is_empty()
        {
            return Err(VectorStoreError::InvalidConfig(
                "lance backend path must not be empty".to_string(),
            ));
        }
        if self.default_extensions.is_empty() {
            return Err(VectorStoreError::InvalidConfig(
                "default extension list must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A validated, not yet connected client.
#[derive(Debug, Clone)]
pub struct VectorClient {
    config: ClientConfig,
}

impl VectorClient {
    /// Validate `config`. No I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::InvalidConfig`] for a zero dimension, an
    /// empty Lance path or an empty default extension list.
    pub fn new(config: ClientConfig) -> Result<Self, VectorStoreError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened.
    pub async fn connect(self) -> Result<ReadyClient, VectorStoreError> {
        let store: Arc<dyn BackendStore> = match &self.config.backend {
            BackendKind::Lance { path } => Arc::new(LanceBackend::open(path).await?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        log::info!("Connected to {:?} backend", self.config.backend);
        Ok(self.with_store(store))
    }

    /// Attach an already opened backend.
    #[must_use]
    pub fn with_store(self, store: Arc<dyn BackendStore>) -> ReadyClient {
        let translator =
            FilterTranslator::with_default_extensions(self.config.default_extensions.iter().cloned());
        ReadyClient {
            store,
            engine: FusionEngine::new(self.config.fusion)
                .with_translator(translator)
                .with_filter_fallback(self.config.filter_fallback),
            dimension: self.config.dimension,
        }
    }
}

/// Connected client. Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct ReadyClient {
    store: Arc<dyn BackendStore>,
    engine: FusionEngine,
    dimension: usize,
}

impl ReadyClient {
    /// Build a ready client around any backend.
    ///
    /// # Errors
    ///
    /// Same validation as [`VectorClient::new`].
    pub fn from_store(
        store: Arc<dyn BackendStore>,
        config: ClientConfig,
    ) -> Result<Self, VectorStoreError> {
        Ok(VectorClient::new(config)?.with_store(store))
    }

    /// Underlying backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BackendStore> {
        &self.store
    }

    /// Fusion engine used by [`Self::hybrid_search`].
    #[must_use]
    pub const fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    /// Configured embedding dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create a collection with the configured dimension.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn create_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.store.create_collection(name, self.dimension).await
    }

    /// Drop a collection.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.store.drop_collection(name).await
    }

    /// Whether a collection exists.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn has_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        self.store.has_collection(name).await
    }

    /// Sorted collection names.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.store.list_collections().await
    }

    /// Upsert documents.
    ///
    /// # Errors
    ///
    /// Propagates backend errors, including dimension mismatches.
    pub async fn insert(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<(), VectorStoreError> {
        let records: Vec<StoredRecord> = documents.iter().map(StoredRecord::from).collect();
        self.store.insert(collection, &records).await
    }

    /// Delete documents by id.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorStoreError> {
        self.store.delete(collection, ids).await
    }

    /// Metadata query with an optional filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::InvalidFilterExpression`] under the
    /// `Reject` policy, otherwise propagates backend errors.
    pub async fn query(
        &self,
        collection: &str,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let predicate = self.resolve_filter(filter)?;
        let hits = self
            .store
            .query(collection, predicate.as_ref(), limit)
            .await?;
        Ok(hits.into_iter().map(|hit| hit.into_document()).collect())
    }

    /// Plain dense-vector search.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::InvalidRequest`] for a zero limit,
    /// [`VectorStoreError::InvalidFilterExpression`] under the `Reject`
    /// policy, otherwise the backend error.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<ScoredResult>, VectorStoreError> {
        let predicate = self.resolve_filter(filter)?;
        let request = SearchRequest::dense(vector, limit);
        run_modality(self.store.as_ref(), collection, &request, predicate.as_ref())
            .await
            .map_err(|err| match err {
                VectorStoreError::ModalityFailure { source, .. } => *source,
                other => other,
            })
    }

    /// Multi-modality search fused into one ranked list.
    ///
    /// An unparseable filter follows `options.filter_fallback` when set,
    /// otherwise the client's configured fallback.
    ///
    /// # Errors
    ///
    /// See [`FusionEngine::fuse`].
    pub async fn hybrid_search(
        &self,
        collection: &str,
        requests: &[SearchRequest],
        options: &FusionOptions,
    ) -> Result<Vec<FusedResult>, VectorStoreError> {
        self.engine
            .fuse(self.store.as_ref(), collection, requests, options)
            .await
    }

    /// Total translation against the configured default predicate.
    #[must_use]
    pub fn translate(&self, expression: &str) -> Predicate {
        self.engine.translator().translate(expression)
    }

    fn resolve_filter(&self, filter: Option<&str>) -> Result<Option<Predicate>, VectorStoreError> {
        match filter {
            Some(expression) => self
                .engine
                .translator()
                .translate_with_policy(expression, self.engine.filter_fallback()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_dimension() {
        let err = VectorClient::new(ClientConfig::memory(0)).unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_rejects_empty_lance_path() {
        let err = VectorClient::new(ClientConfig::lance("", 4)).unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_new_rejects_empty_extensions() {
        let mut config = ClientConfig::memory(4);
        config.default_extensions.clear();
        assert!(VectorClient::new(config).is_err());
    }

    #[test]
    fn test_new_does_not_touch_the_filesystem() {
        let missing = std::env::temp_dir().join("vecfuse-never-created-by-new");
        let client = VectorClient::new(ClientConfig::lance(&missing, 4)).unwrap();
        assert_eq!(client.config().dimension, 4);
        assert!(!missing.exists());
    }
}
