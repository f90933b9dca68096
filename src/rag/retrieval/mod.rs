//! Ranking pipeline: normalization, lexical scoring, fusion and rerank.

pub mod fusion;
pub mod hybrid_search;
pub mod lexical;
pub mod normalize;
pub mod rerank;

pub use fusion::{fuse, fused_score, sort_by_combined_score};
pub use hybrid_search::HybridSearchEngine;
pub use lexical::{ExpandedTerms, LexicalMatch, LexicalScorer};
pub use normalize::normalize_scores;
pub use rerank::{context_boost, is_site_query, position_boost, rerank};
