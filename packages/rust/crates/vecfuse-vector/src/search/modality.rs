//! Single-modality search behind one signature.

use vecfuse_types::{ModalityQuery, ScoredResult, SearchRequest};

use super::distance_to_score;
use crate::VectorStoreError;
use crate::backend::BackendStore;
use crate::filter::Predicate;

/// Run one modality request and convert its hits to scored documents.
///
/// Results keep the order the backend returned them in. Any backend error
/// comes back as [`VectorStoreError::ModalityFailure`]; no retry is made.
///
/// # Errors
///
/// - [`VectorStoreError::InvalidRequest`] when `request.limit` is zero.
/// - [`VectorStoreError::ModalityFailure`] wrapping the backend error.
pub async fn run_modality(
    store: &dyn BackendStore,
    collection: &str,
    request: &SearchRequest,
    predicate: Option<&Predicate>,
) -> Result<Vec<ScoredResult>, VectorStoreError> {
    let modality = request.modality();
    if request.limit == 0 {
        return Err(VectorStoreError::InvalidRequest(format!(
            "{modality} request limit must be positive"
        )));
    }

    let hits = match &request.query {
        ModalityQuery::Dense { vector } => {
            store
                .search_dense(
                    collection,
                    vector,
                    request.limit,
                    predicate,
                    &request.extra_params,
                )
                .await
        }
        ModalityQuery::Lexical { text } => {
            store
                .search_lexical(
                    collection,
                    text,
                    request.limit,
                    predicate,
                    &request.extra_params,
                )
                .await
        }
    }
    .map_err(|err| VectorStoreError::modality_failure(modality, err))?;

    log::debug!(
        "{modality} search on '{collection}' returned {} hits",
        hits.len()
    );

    Ok(hits
        .into_iter()
        .map(|hit| {
            let score = distance_to_score(hit.raw_distance);
            ScoredResult {
                document: hit.into_document(),
                score,
            }
        })
        .collect())
}
