//! Error types for collection, search and fusion operations.

pub use lance::deps::arrow_schema::ArrowError;
use thiserror::Error;
use vecfuse_types::Modality;

/// Errors for vector store operations
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `Lance` error
    #[error("Lance error: {0}")]
    LanceDB(#[from] lance::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection not found
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Invalid embedding dimension
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid embedding dimension (zero)
    #[error("Embedding dimension must be positive")]
    InvalidEmbeddingDimension,

    /// Transport or connection failure talking to a remote backend.
    ///
    /// The embedded Lance and in-memory backends never raise it: Lance
    /// storage failures surface as [`Self::LanceDB`] or [`Self::Io`].
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Filter expression did not match the supported grammar
    #[error("Invalid filter expression: {0}")]
    InvalidFilterExpression(String),

    /// One modality of a fusion call failed
    #[error("{modality} search failed: {source}")]
    ModalityFailure {
        /// Modality whose backend call failed
        modality: Modality,
        /// Underlying backend error
        #[source]
        source: Box<VectorStoreError>,
    },

    /// Request rejected before reaching the backend
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fusion call exceeded its deadline
    #[error("Search timed out after {0} ms")]
    Timeout(u64),

    /// General error with message
    #[error("{0}")]
    General(String),
}

impl VectorStoreError {
    /// Wrap a backend error as the failure of one modality.
    #[must_use]
    pub fn modality_failure(modality: Modality, source: Self) -> Self {
        Self::ModalityFailure {
            modality,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_failure_names_modality_and_cause() {
        let err = VectorStoreError::modality_failure(
            Modality::Dense,
            VectorStoreError::BackendUnavailable("connection refused".to_string()),
        );
        let expected = format!(
            "{} search failed: Backend unavailable: connection refused",
            Modality::Dense
        );
        assert_eq!(err.to_string(), expected);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_lance_io_failure_is_not_reported_as_unavailable() {
        let err = VectorStoreError::from(std::io::Error::other("disk gone"));
        assert!(matches!(err, VectorStoreError::Io(_)));
        assert!(!matches!(err, VectorStoreError::BackendUnavailable(_)));
    }
}
