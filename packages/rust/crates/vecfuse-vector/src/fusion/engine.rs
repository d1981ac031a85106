//! Fusion engine: N modality searches merged into one ranked list.

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use vecfuse_types::{FilterFallback, FusedResult, FusionOptions, ScoredResult, SearchRequest};

use super::FusionAccumulator;
use crate::VectorStoreError;
use crate::backend::BackendStore;
use crate::filter::{FilterTranslator, Predicate};
use crate::search::run_modality;

/// What a fusion call does when one modality fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalityFailurePolicy {
    /// Abort the whole call with the modality error
    #[default]
    Fail,
    /// Treat the failed modality as returning nothing
    Degrade,
}

/// How modality requests are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One request at a time, in input order
    #[default]
    Sequential,
    /// All requests in flight at once; merged in input order once all finish
    Concurrent,
}

/// Engine-wide fusion behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionPolicy {
    /// Reaction to a failed modality
    pub on_modality_failure: ModalityFailurePolicy,
    /// Scheduling of modality requests
    pub execution: Execution,
    /// Deadline for a whole fusion call
    pub timeout: Option<Duration>,
}

impl FusionPolicy {
    /// Set the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: ModalityFailurePolicy) -> Self {
        self.on_modality_failure = policy;
        self
    }

    /// Set the execution mode.
    #[must_use]
    pub const fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Set the call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Orchestrates modality searches and merges their results.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    policy: FusionPolicy,
    translator: FilterTranslator,
    filter_fallback: FilterFallback,
}

impl FusionEngine {
    /// Engine with the built-in default filter predicate.
    #[must_use]
    pub fn new(policy: FusionPolicy) -> Self {
        Self {
            policy,
            translator: FilterTranslator::default(),
            filter_fallback: FilterFallback::default(),
        }
    }

    /// Policy for unparseable filters when the call options name none.
    #[must_use]
    pub const fn with_filter_fallback(mut self, fallback: FilterFallback) -> Self {
        self.filter_fallback = fallback;
        self
    }

    /// Replace the filter translator (and with it the default predicate).
    #[must_use]
    pub fn with_translator(mut self, translator: FilterTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    /// Active filter translator.
    #[must_use]
    pub const fn translator(&self) -> &FilterTranslator {
        &self.translator
    }

    /// Fallback applied when `FusionOptions::filter_fallback` is `None`.
    #[must_use]
    pub const fn filter_fallback(&self) -> FilterFallback {
        self.filter_fallback
    }

    /// Run every request against `collection` and fuse the results.
    ///
    /// The filter expression is translated once and applied to every
    /// request, under `options.filter_fallback` or else the engine's own
    /// fallback. Scores of an id seen by several modalities are merged with a
    /// running pairwise mean; the output is sorted by descending score with
    /// ties in first-seen order and holds at most `options.limit` entries.
    ///
    /// # Errors
    ///
    /// - [`VectorStoreError::InvalidRequest`] for a zero limit on the
    ///   options or on any request.
    /// - [`VectorStoreError::InvalidFilterExpression`] under the `Reject`
    ///   filter policy.
    /// - [`VectorStoreError::ModalityFailure`] under the `Fail` policy.
    /// - [`VectorStoreError::Timeout`] when the deadline passes; no partial
    ///   result is returned.
    pub async fn fuse(
        &self,
        store: &dyn BackendStore,
        collection: &str,
        requests: &[SearchRequest],
        options: &FusionOptions,
    ) -> Result<Vec<FusedResult>, VectorStoreError> {
        if options.limit == 0 {
            return Err(VectorStoreError::InvalidRequest(
                "fusion limit must be positive".to_string(),
            ));
        }
        let predicate = match options.filter_expression.as_deref() {
            Some(expression) => self
                .translator
                .translate_with_policy(
                    expression,
                    options.filter_fallback.unwrap_or(self.filter_fallback),
                )?,
            None => None,
        };

        let work = self.fuse_with_predicate(
            store,
            collection,
            requests,
            predicate.as_ref(),
            options.limit,
        );
        match self.policy.timeout {
            Some(deadline) => tokio::time::timeout(deadline, work).await.map_err(|_| {
                log::warn!("Fusion on '{collection}' exceeded {deadline:?}");
                VectorStoreError::Timeout(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX))
            })?,
            None => work.await,
        }
    }

    async fn fuse_with_predicate(
        &self,
        store: &dyn BackendStore,
        collection: &str,
        requests: &[SearchRequest],
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<FusedResult>, VectorStoreError> {
        let outcomes: Vec<Result<Vec<ScoredResult>, VectorStoreError>> = match self.policy.execution
        {
            Execution::Sequential => {
                let mut outcomes = Vec::with_capacity(requests.len());
                for request in requests {
                    match run_modality(store, collection, request, predicate).await {
                        Ok(results) => outcomes.push(Ok(results)),
                        Err(err) => self.absorb(err)?,
                    }
                }
                outcomes
            }
            Execution::Concurrent => {
                join_all(
                    requests
                        .iter()
                        .map(|request| run_modality(store, collection, request, predicate)),
                )
                .await
            }
        };

        let mut accumulator = FusionAccumulator::new();
        for outcome in outcomes {
            match outcome {
                Ok(results) => accumulator.merge(results),
                Err(err) => self.absorb(err)?,
            }
        }
        log::debug!(
            "Fused {} requests on '{collection}' into {} distinct documents",
            requests.len(),
            accumulator.len()
        );
        Ok(accumulator.finish(limit))
    }

    /// Swallow a degradable modality failure, or hand the error back.
    fn absorb(&self, err: VectorStoreError) -> Result<(), VectorStoreError> {
        if self.policy.on_modality_failure == ModalityFailurePolicy::Degrade
            && let VectorStoreError::ModalityFailure { modality, .. } = &err
        {
            log::warn!("Degrading: {modality} modality contributes no results ({err})");
            return Ok(());
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = FusionPolicy::default();
        assert_eq!(policy.on_modality_failure, ModalityFailurePolicy::Fail);
        assert_eq!(policy.execution, Execution::Sequential);
        assert_eq!(policy.timeout, None);
    }

    #[test]
    fn test_policy_builders() {
        let policy = FusionPolicy::default()
            .with_failure_policy(ModalityFailurePolicy::Degrade)
            .with_execution(Execution::Concurrent)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(policy.on_modality_failure, ModalityFailurePolicy::Degrade);
        assert_eq!(policy.execution, Execution::Concurrent);
        assert_eq!(policy.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_engine_fallback_defaults_to_use_default() {
        let engine = FusionEngine::default();
        assert_eq!(engine.filter_fallback(), FilterFallback::UseDefault);
        let engine = engine.with_filter_fallback(FilterFallback::Reject);
        assert_eq!(engine.filter_fallback(), FilterFallback::Reject);
    }

    #[test]
    fn test_policy_enums_use_snake_case() {
        let value = serde_json::to_value(ModalityFailurePolicy::Degrade).unwrap();
        assert_eq!(value, "degrade");
        let parsed: Execution = serde_json::from_str("\"concurrent\"").unwrap();
        assert_eq!(parsed, Execution::Concurrent);
    }
}
