//! vecfuse-vector - Vector collection adapter with hybrid search fusion
//!
//! # Architecture
//!
//! ```text
//! vecfuse-vector/src/
//! ├── lib.rs          # Re-exports
//! ├── error.rs        # VectorStoreError enum
//! ├── config.rs       # YAML runtime settings (system + user merge)
//! ├── client.rs       # VectorClient (validate) -> ReadyClient (connected)
//! ├── filter/         # `field in [..]` translator, Lance WHERE rendering
//! ├── backend/        # BackendStore trait, Lance and in-memory stores
//! ├── search/         # Modality adapter, score kernels
//! └── fusion/         # Accumulator and FusionEngine
//! ```
//!
//! Control flow of a hybrid search: the caller hands a list of
//! [`SearchRequest`]s and [`FusionOptions`] to [`FusionEngine::fuse`]; the
//! filter expression is translated once, each request runs through
//! [`run_modality`], and the per-modality results are merged by document id.
//!
//! Uses [vecfuse-lance][vecfuse_lance] for `RecordBatch` utilities.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod fusion;
pub mod search;

pub use backend::{BackendStore, LanceBackend, MemoryBackend, StoredHit, StoredRecord};
pub use client::{BackendKind, ClientConfig, ReadyClient, VectorClient};
pub use config::{
    DEFAULT_DIMENSION, RuntimeSettings, load_runtime_settings, load_runtime_settings_from_paths,
    set_config_home_override,
};
pub use error::VectorStoreError;
pub use filter::{FilterTranslator, Predicate, translate, translate_with_policy};
pub use fusion::{Execution, FusionEngine, FusionPolicy, ModalityFailurePolicy};
pub use search::run_modality;
pub use vecfuse_types::{
    Document, FilterFallback, FusedResult, FusionOptions, Metadata, Modality, ModalityQuery,
    ScoredResult, SearchRequest,
};
