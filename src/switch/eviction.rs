//! Eviction candidate ordering.
//!
//! Left as a trait so a future LRU or pinning strategy can be swapped in
//! without touching the switch engine's stop/start sequencing.

use crate::registry::ModelSpec;

/// Orders running models (never including the switch target) by preference
/// for eviction — most preferred to evict first.
pub trait EvictionStrategy: Send + Sync {
    fn order(&self, candidates: Vec<ModelSpec>) -> Vec<ModelSpec>;
}

/// Evicts the largest resident models first, minimizing the number of stop
/// operations needed to free enough VRAM.
pub struct LargestFirst;

impl EvictionStrategy for LargestFirst {
    fn order(&self, mut candidates: Vec<ModelSpec>) -> Vec<ModelSpec> {
        candidates.sort_by(|a, b| {
            b.approx_weights_gb
                .partial_cmp(&a.approx_weights_gb)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }
}
