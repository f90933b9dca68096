//! Post-ranking result enrichment.

use crate::rag::core::candidate::SearchHit;

/// Adds context to ranked hits.
///
/// Implementations only touch metadata. Scores and order are left as ranked,
/// and a hit that cannot be enriched is returned unchanged. `enrich` is called
/// on the blocking thread pool and may do synchronous I/O.
pub trait ResultEnricher: Send + Sync {
    /// Enricher name used in logs.
    fn name(&self) -> &'static str;

    /// Enrich a ranked result list.
    fn enrich(&self, hits: Vec<SearchHit>) -> Vec<SearchHit>;
}
