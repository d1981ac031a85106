//! Scripted backend for fusion tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use vecfuse_vector::filter::Predicate;
use vecfuse_vector::{BackendStore, Metadata, Modality, StoredHit, StoredRecord, VectorStoreError};

/// What one modality call returns.
#[derive(Debug, Clone)]
pub enum Script {
    /// `(id, raw_distance)` pairs in backend order
    Hits(Vec<(&'static str, f64)>),
    /// Transport failure
    Unavailable,
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub modality: Modality,
    pub limit: usize,
    pub predicate: Option<Predicate>,
}

/// Backend whose dense and lexical answers are fixed up front.
pub struct ScriptedBackend {
    dense: Script,
    lexical: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new(dense: Script, lexical: Script) -> Self {
        Self {
            dense,
            lexical,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(
        &self,
        modality: Modality,
        limit: usize,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        self.calls.lock().unwrap().push(Call {
            modality,
            limit,
            predicate: predicate.cloned(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = match modality {
            Modality::Dense => &self.dense,
            Modality::Lexical => &self.lexical,
        };
        match script {
            Script::Hits(hits) => Ok(hits
                .iter()
                .take(limit)
                .map(|(id, raw_distance)| hit(id, *raw_distance))
                .collect()),
            Script::Unavailable => Err(VectorStoreError::BackendUnavailable(format!(
                "{modality} endpoint refused connection"
            ))),
        }
    }
}

/// A hit carrying reserved fields plus one caller key.
pub fn hit(id: &str, raw_distance: f64) -> StoredHit {
    let mut metadata = Metadata::new();
    metadata.insert("relativePath".to_string(), json!(format!("src/{id}.rs")));
    metadata.insert("startLine".to_string(), json!(1));
    metadata.insert("endLine".to_string(), json!(20));
    metadata.insert("fileExtension".to_string(), json!(".rs"));
    metadata.insert("language".to_string(), json!("rust"));
    StoredHit {
        id: id.to_string(),
        raw_distance,
        content: format!("chunk {id}"),
        metadata,
    }
}

#[async_trait]
impl BackendStore for ScriptedBackend {
    async fn create_collection(&self, _: &str, _: usize) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn drop_collection(&self, _: &str) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn has_collection(&self, _: &str) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        Ok(vec!["code".to_string()])
    }

    async fn insert(&self, _: &str, _: &[StoredRecord]) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn delete(&self, _: &str, _: &[String]) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn query(
        &self,
        _: &str,
        _: Option<&Predicate>,
        _: Option<usize>,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        Ok(Vec::new())
    }

    async fn search_dense(
        &self,
        _: &str,
        _: &[f32],
        limit: usize,
        predicate: Option<&Predicate>,
        _: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        self.answer(Modality::Dense, limit, predicate).await
    }

    async fn search_lexical(
        &self,
        _: &str,
        _: &str,
        limit: usize,
        predicate: Option<&Predicate>,
        _: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        self.answer(Modality::Lexical, limit, predicate).await
    }
}
