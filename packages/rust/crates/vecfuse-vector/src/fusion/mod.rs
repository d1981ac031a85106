//! Hybrid search fusion.
//!
//! Layout: `accumulator` (per-call id → score merge), `engine` (scheduling,
//! failure policy, deadline).
//!
//! The merge is a running pairwise mean of `[0, 1]` scores, not a
//! rank-based fusion; two modalities agreeing on a document pull it towards
//! their average rather than boosting it.

mod accumulator;
mod engine;

pub use accumulator::FusionAccumulator;
pub use engine::{Execution, FusionEngine, FusionPolicy, ModalityFailurePolicy};
