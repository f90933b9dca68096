//! Weighted linear fusion of semantic and lexical scores.

use crate::rag::core::candidate::ScoredCandidate;
use crate::rag::core::config::HybridSearchConfig;

/// Combine the two signals: `semantic_weight * semantic + keyword_weight * lexical`.
#[must_use]
pub fn fused_score(config: &HybridSearchConfig, semantic: f64, lexical: f64) -> f64 {
    config
        .keyword_weight
        .mul_add(lexical, config.semantic_weight * semantic)
}

/// Set `combined_score` on every candidate from its semantic and lexical scores.
pub fn fuse(scored: &mut [ScoredCandidate], config: &HybridSearchConfig) {
    for item in scored.iter_mut() {
        item.combined_score = fused_score(config, item.semantic_score, item.lexical_score);
    }
}

/// Stable sort by descending `combined_score`; ties keep retrieval order.
pub fn sort_by_combined_score(scored: &mut [ScoredCandidate]) {
    scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
}
