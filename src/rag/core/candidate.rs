//! Candidate fragments as they move through the ranking stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to a content fragment.
pub type Metadata = serde_json::Map<String, Value>;

/// One fragment returned by the vector index, before fusion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Fragment text.
    pub content: String,
    /// Fragment metadata (file name, URL, site grouping, ...).
    pub metadata: Metadata,
    /// Similarity reported by the index, any real number.
    pub raw_similarity: f64,
}

impl Candidate {
    /// Create a candidate.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata, raw_similarity: f64) -> Self {
        Self {
            content: content.into(),
            metadata,
            raw_similarity,
        }
    }

    /// Read a metadata field as a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Candidate with its per-stage scores.
///
/// `semantic_score` and `lexical_score` stay in `[0, 1]`. `combined_score` is
/// the sort key and may exceed 1 once rerank boosts are added.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    /// The retrieved fragment.
    pub candidate: Candidate,
    /// Min-max normalized similarity.
    pub semantic_score: f64,
    /// Lexical match score.
    pub lexical_score: f64,
    /// Fused score, plus rerank boosts when enabled.
    pub combined_score: f64,
    /// Rerank boost from early query-term positions.
    pub position_boost: f64,
    /// Rerank boost from site context metadata.
    pub context_boost: f64,
}

impl ScoredCandidate {
    /// Wrap a candidate with zeroed scores.
    #[must_use]
    pub const fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            semantic_score: 0.0,
            lexical_score: 0.0,
            combined_score: 0.0,
            position_boost: 0.0,
            context_boost: 0.0,
        }
    }

    /// Per-signal contributions to the final score.
    #[must_use]
    pub const fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            raw_similarity: self.candidate.raw_similarity,
            semantic: self.semantic_score,
            lexical: self.lexical_score,
            position_boost: self.position_boost,
            context_boost: self.context_boost,
        }
    }

    /// Convert into the externally visible result shape.
    #[must_use]
    pub fn into_hit(self) -> SearchHit {
        let breakdown = self.breakdown();
        SearchHit {
            content: self.candidate.content,
            metadata: self.candidate.metadata,
            score: self.combined_score,
            breakdown,
        }
    }
}

/// Score components reported with each hit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Similarity as returned by the index.
    pub raw_similarity: f64,
    /// Normalized semantic score.
    pub semantic: f64,
    /// Lexical score.
    pub lexical: f64,
    /// Rerank position boost (already scaled).
    pub position_boost: f64,
    /// Rerank context boost.
    pub context_boost: f64,
}

/// Ranked search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Fragment text.
    pub content: String,
    /// Fragment metadata, possibly enriched.
    pub metadata: Metadata,
    /// Final ranking score.
    pub score: f64,
    /// Score components.
    pub breakdown: ScoreBreakdown,
}
