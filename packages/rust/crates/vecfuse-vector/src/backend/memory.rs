//! Process-local backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use vecfuse_types::Metadata;

use super::{BackendStore, StoredHit, StoredRecord};
use crate::VectorStoreError;
use crate::filter::Predicate;

#[derive(Debug, Default)]
struct MemoryCollection {
    dimension: usize,
    rows: Vec<StoredRecord>,
}

/// Backend holding every collection in memory.
///
/// Dense distance is cosine distance (`1 - cos`). Lexical distance is the
/// share of distinct query tokens missing from the document. Equal
/// distances keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_matches(predicate: Option<&Predicate>, record: &StoredRecord) -> bool {
    let Some(predicate) = predicate else {
        return true;
    };
    match predicate.field.as_str() {
        "id" => predicate.values.iter().any(|v| *v == record.id),
        "content" => predicate.values.iter().any(|v| *v == record.content),
        _ => predicate.matches(&record.metadata),
    }
}

fn to_hit(record: &StoredRecord, raw_distance: f64) -> StoredHit {
    StoredHit {
        id: record.id.clone(),
        raw_distance,
        content: record.content.clone(),
        metadata: record.metadata.clone(),
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn rank(mut scored: Vec<(f64, StoredHit)>, limit: usize) -> Vec<StoredHit> {
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().take(limit).map(|(_, hit)| hit).collect()
}

#[async_trait]
impl BackendStore for MemoryBackend {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<(), VectorStoreError> {
        if dimension == 0 {
            return Err(VectorStoreError::InvalidEmbeddingDimension);
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection {
                dimension,
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn insert(
        &self,
        collection: &str,
        records: &[StoredRecord],
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != target.dimension) {
            return Err(VectorStoreError::InvalidDimension {
                expected: target.dimension,
                actual: bad.vector.len(),
            });
        }
        for record in records {
            match target.rows.iter_mut().find(|row| row.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => target.rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        target.rows.retain(|row| !doomed.contains(row.id.as_str()));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        Ok(target
            .rows
            .iter()
            .filter(|row| record_matches(predicate, row))
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| to_hit(row, 0.0))
            .collect())
    }

    async fn search_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        predicate: Option<&Predicate>,
        _params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != target.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: target.dimension,
                actual: vector.len(),
            });
        }
        let scored = target
            .rows
            .iter()
            .filter(|row| record_matches(predicate, row))
            .map(|row| {
                let distance = cosine_distance(vector, &row.vector);
                (distance, to_hit(row, distance))
            })
            .collect();
        Ok(rank(scored, limit))
    }

    async fn search_lexical(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
        predicate: Option<&Predicate>,
        _params: &Metadata,
    ) -> Result<Vec<StoredHit>, VectorStoreError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let mut query_tokens: Vec<String> = Vec::new();
        for token in tokenize(text) {
            if !query_tokens.contains(&token) {
                query_tokens.push(token);
            }
        }
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        #[allow(clippy::cast_precision_loss)]
        let total = query_tokens.len() as f64;

        let scored = target
            .rows
            .iter()
            .filter(|row| record_matches(predicate, row))
            .filter_map(|row| {
                let doc_tokens: HashSet<String> = tokenize(&row.content).collect();
                let matched = query_tokens
                    .iter()
                    .filter(|t| doc_tokens.contains(*t))
                    .count();
                if matched == 0 {
                    return None;
                }
                #[allow(clippy::cast_precision_loss)]
                let distance = 1.0 - matched as f64 / total;
                Some((distance, to_hit(row, distance)))
            })
            .collect();
        Ok(rank(scored, limit))
    }
}
