//! Per-call merge state keyed by document id.

use std::collections::HashMap;

use vecfuse_types::{FusedResult, ScoredResult};

/// Running pairwise mean of scores per document id.
///
/// Entries stay in first-seen order so that a stable sort breaks score ties
/// by insertion.
#[derive(Debug, Default)]
pub struct FusionAccumulator {
    entries: Vec<FusedResult>,
    positions: HashMap<String, usize>,
}

impl FusionAccumulator {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one modality's results.
    ///
    /// A first sighting records the score as-is; a repeat sighting replaces
    /// the stored score with `(stored + new) / 2`. The first document
    /// payload seen for an id is kept.
    pub fn merge(&mut self, results: Vec<ScoredResult>) {
        for ScoredResult { document, score } in results {
            if let Some(&idx) = self.positions.get(&document.id) {
                let entry = &mut self.entries[idx];
                entry.score = (entry.score + score) / 2.0;
            } else {
                self.positions.insert(document.id.clone(), self.entries.len());
                self.entries.push(FusedResult { document, score });
            }
        }
    }

    /// Number of distinct ids merged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort by descending score (ties keep first-seen order) and truncate.
    #[must_use]
    pub fn finish(mut self, limit: usize) -> Vec<FusedResult> {
        self.entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.entries.truncate(limit);
        self.entries
    }
}
