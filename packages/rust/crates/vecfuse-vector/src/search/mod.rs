//! Modality search adapter: one backend call per request, scores
//! normalized to `[0, 1]`.

mod kernels;
mod modality;

pub use kernels::{distance_to_score, relevance_to_distance};
pub use modality::run_modality;
