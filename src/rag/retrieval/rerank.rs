//! Heuristic rerank applied after fusion.
//!
//! Two additive boosts: one for query terms that occur early in the content,
//! one for fragments that carry site context metadata.

use serde_json::Value;

use crate::rag::core::candidate::{Candidate, ScoredCandidate};
use crate::rag::core::query::QueryTerms;
use crate::rag::retrieval::fusion::sort_by_combined_score;

/// Scale applied to the summed per-term position factors.
pub const POSITION_BOOST_SCALE: f64 = 0.1;
/// Boost for fragments with site context metadata.
pub const CONTEXT_BOOST: f64 = 0.15;
/// Boost for fragments with site context metadata when the query asks about the site.
/// Replaces `CONTEXT_BOOST`, it is not added to it.
pub const SITE_QUERY_CONTEXT_BOOST: f64 = 0.25;

/// Metadata keys that mark a fragment as carrying site context.
pub const CONTEXT_METADATA_KEYS: &[&str] = &["site_common", "navigation_links", "url"];

const SITE_QUERY_TERMS: &[&str] = &["site", "this"];
const POSITION_SCALE_CHARS: f64 = 100.0;

/// Whether the query is about the site itself.
#[must_use]
pub fn is_site_query(terms: &QueryTerms) -> bool {
    SITE_QUERY_TERMS.iter().any(|term| terms.contains(term))
}

/// `0.1 * sum(1 / (1 + pos / 100))` over terms found in the content, where
/// `pos` is the character offset of the term's first occurrence.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Character offsets of text fragments.
pub fn position_boost(terms: &QueryTerms, content: &str) -> f64 {
    let content = content.to_lowercase();
    let factors: f64 = terms
        .iter()
        .filter_map(|term| content.find(term))
        .map(|byte_pos| {
            let pos = content[..byte_pos].chars().count() as f64;
            1.0 / (1.0 + pos / POSITION_SCALE_CHARS)
        })
        .sum();
    POSITION_BOOST_SCALE * factors
}

/// Context boost for a candidate, `0.0` when it has no site context.
#[must_use]
pub fn context_boost(candidate: &Candidate, site_query: bool) -> f64 {
    let has_context = CONTEXT_METADATA_KEYS
        .iter()
        .any(|key| candidate.metadata.get(*key).is_some_and(is_truthy));
    match (has_context, site_query) {
        (false, _) => 0.0,
        (true, false) => CONTEXT_BOOST,
        (true, true) => SITE_QUERY_CONTEXT_BOOST,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// Add both boosts to every `combined_score`, then re-sort (stable, descending).
pub fn rerank(scored: &mut [ScoredCandidate], terms: &QueryTerms) {
    let site_query = is_site_query(terms);
    for item in scored.iter_mut() {
        item.position_boost = position_boost(terms, &item.candidate.content);
        item.context_boost = context_boost(&item.candidate, site_query);
        item.combined_score += item.position_boost + item.context_boost;
    }
    sort_by_combined_score(scored);
}
