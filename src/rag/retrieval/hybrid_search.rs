//! Hybrid search combining vector similarity with lexical matching.
//!
//! The vector index is over-fetched (`top_k * 2`), its similarities are
//! min-max normalized, the same pool is lexically scored, both signals are
//! fused with configurable weights and an optional heuristic rerank runs
//! before truncation to `top_k`.
//!
//! The engine keeps no state between calls; every search builds its own
//! candidate buffers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::rag::core::candidate::{Candidate, ScoredCandidate, SearchHit};
use crate::rag::core::config::HybridSearchConfig;
use crate::rag::core::errors::RagResult;
use crate::rag::core::query::Query;
use crate::rag::embedding::embedder::Embedder;
use crate::rag::retrieval::fusion::{fuse, sort_by_combined_score};
use crate::rag::retrieval::lexical::LexicalScorer;
use crate::rag::retrieval::normalize::normalize_scores;
use crate::rag::retrieval::rerank::rerank;
use crate::rag::storage::vector_index::VectorIndex;

/// Orchestrates embedding, retrieval and ranking for one query at a time.
#[derive(Clone)]
pub struct HybridSearchEngine {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    scorer: LexicalScorer,
    config: HybridSearchConfig,
}

impl HybridSearchEngine {
    /// Create an engine over shared collaborators.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: HybridSearchConfig,
    ) -> RagResult<Self> {
        config.validate()?;
        Ok(Self {
            index,
            embedder,
            scorer: LexicalScorer::new()?,
            config,
        })
    }

    /// Default ranking configuration used by `search`.
    #[must_use]
    pub const fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    /// Search with the engine's configuration.
    ///
    /// # Errors
    /// Returns an error for a blank query, or if embedding or retrieval fails.
    pub async fn search(&self, query: &str) -> RagResult<Vec<ScoredCandidate>> {
        self.search_with(query, &self.config).await
    }

    /// Search with a per-call configuration.
    ///
    /// Embedding and index failures abort the search; no partial ranking is returned.
    ///
    /// # Errors
    /// Returns an error for a blank query or invalid configuration, or if
    /// embedding or retrieval fails.
    pub async fn search_with(
        &self,
        query: &str,
        config: &HybridSearchConfig,
    ) -> RagResult<Vec<ScoredCandidate>> {
        let query = Query::parse(query)?;
        config.validate()?;

        let embedding = self.embedder.embed_text(query.as_str()).await?;
        let limit = config.fetch_limit();
        let hits = self.index.search(&embedding.vec, limit).await?;
        debug!(
            backend = self.index.name(),
            requested = limit,
            retrieved = hits.len(),
            "vector candidates retrieved"
        );

        let candidates = hits.into_iter().map(Candidate::from).collect();
        let ranked = self.rank(&query, candidates, config);
        info!(
            terms = query.terms().len(),
            results = ranked.len(),
            top_k = config.top_k,
            rerank = config.rerank,
            "hybrid search completed"
        );
        Ok(ranked)
    }

    /// Search and convert results into `SearchHit`s.
    ///
    /// # Errors
    /// Same as `search_with`.
    pub async fn search_hits(
        &self,
        query: &str,
        config: &HybridSearchConfig,
    ) -> RagResult<Vec<SearchHit>> {
        let ranked = self.search_with(query, config).await?;
        Ok(ranked.into_iter().map(ScoredCandidate::into_hit).collect())
    }

    /// Rank an already retrieved candidate pool. Pure and synchronous.
    #[must_use]
    pub fn rank(
        &self,
        query: &Query,
        candidates: Vec<Candidate>,
        config: &HybridSearchConfig,
    ) -> Vec<ScoredCandidate> {
        let pool: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| {
                let finite = candidate.raw_similarity.is_finite();
                if !finite {
                    warn!(
                        raw_similarity = candidate.raw_similarity,
                        "skipping candidate with non-finite similarity"
                    );
                }
                finite
            })
            .collect();
        if pool.is_empty() {
            return Vec::new();
        }

        let raw: Vec<f64> = pool.iter().map(|c| c.raw_similarity).collect();
        let semantic = normalize_scores(&raw);
        let lexical = self.scorer.score_pool(query.terms(), &pool);

        let mut scored: Vec<ScoredCandidate> = pool
            .into_iter()
            .zip(semantic)
            .zip(lexical)
            .map(|((candidate, semantic_score), lexical_score)| {
                let mut item = ScoredCandidate::new(candidate);
                item.semantic_score = semantic_score;
                item.lexical_score = lexical_score;
                item
            })
            .collect();

        fuse(&mut scored, config);
        sort_by_combined_score(&mut scored);
        if config.rerank {
            rerank(&mut scored, query.terms());
        }
        scored.truncate(config.top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rig::embeddings::{Embedding, EmbeddingError};
    use serde_json::json;

    use crate::rag::core::candidate::Metadata;
    use crate::rag::core::errors::RagError;
    use crate::rag::embedding::embedder::EmbedFuture;
    use crate::rag::storage::vector_index::{IndexFuture, IndexedChunk, VectorHit};

    struct FixedEmbedder {
        fail: bool,
    }

    impl Embedder for FixedEmbedder {
        fn embed_text(&self, text: &str) -> EmbedFuture<'_, RagResult<Embedding>> {
            let document = text.to_string();
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(RagError::Embedding(EmbeddingError::ProviderError(
                        "provider down".to_string(),
                    )));
                }
                Ok(Embedding {
                    document,
                    vec: vec![1.0, 0.0],
                })
            })
        }

        fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Embedding>>> {
            Box::pin(async move {
                Ok(texts
                    .into_iter()
                    .map(|document| Embedding {
                        document,
                        vec: vec![1.0, 0.0],
                    })
                    .collect())
            })
        }

        fn ndims(&self) -> usize {
            2
        }
    }

    struct FixedIndex {
        hits: Vec<VectorHit>,
        fail: bool,
        requested: Mutex<Vec<usize>>,
    }

    impl FixedIndex {
        fn new(hits: Vec<VectorHit>) -> Self {
            Self {
                hits,
                fail: false,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl VectorIndex for FixedIndex {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn add(&self, _chunks: Vec<IndexedChunk>) -> IndexFuture<'_, RagResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn search(
            &self,
            _query_vector: &[f64],
            limit: usize,
        ) -> IndexFuture<'_, RagResult<Vec<VectorHit>>> {
            Box::pin(async move {
                self.requested.lock().unwrap().push(limit);
                if self.fail {
                    return Err(RagError::Index("backend unreachable".to_string()));
                }
                Ok(self.hits.iter().take(limit).cloned().collect())
            })
        }

        fn delete_all(&self) -> IndexFuture<'_, RagResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn count(&self) -> IndexFuture<'_, RagResult<usize>> {
            let count = self.hits.len();
            Box::pin(async move { Ok(count) })
        }
    }

    fn hit(content: &str, score: f64) -> VectorHit {
        VectorHit {
            content: content.to_string(),
            metadata: Metadata::new(),
            score,
        }
    }

    fn hit_with_file(content: &str, file_name: &str, score: f64) -> VectorHit {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), json!(file_name));
        VectorHit {
            content: content.to_string(),
            metadata,
            score,
        }
    }

    fn engine(index: FixedIndex, config: HybridSearchConfig) -> (HybridSearchEngine, Arc<FixedIndex>) {
        let index = Arc::new(index);
        let engine = HybridSearchEngine::new(
            index.clone(),
            Arc::new(FixedEmbedder { fail: false }),
            config,
        )
        .unwrap();
        (engine, index)
    }

    fn no_rerank(top_k: usize) -> HybridSearchConfig {
        HybridSearchConfig::default()
            .with_top_k(top_k)
            .with_rerank(false)
    }

    // B matches "pricing" in content (saturated frequency) and in its file name,
    // which scores lexical 1.0; A has no match.
    const KEYWORD_CONTENT: &str = "pricing pricing pricing pricing pricing";

    #[tokio::test]
    async fn test_semantic_lead_survives_lexical_match() {
        let (engine, _) = engine(
            FixedIndex::new(vec![
                hit("general overview", 0.9),
                hit_with_file(KEYWORD_CONTENT, "pricing.pdf", 0.5),
            ]),
            no_rerank(2),
        );

        let results = engine.search("pricing").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate.content, "general overview");
        assert!((results[0].semantic_score - 1.0).abs() < 1e-12);
        assert!(results[0].lexical_score.abs() < 1e-12);
        assert!((results[0].combined_score - 0.7).abs() < 1e-12);
        assert!(results[1].semantic_score.abs() < 1e-12);
        assert!((results[1].lexical_score - 1.0).abs() < 1e-12);
        assert!((results[1].combined_score - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_lexical_match_flips_close_similarities() {
        let (engine, _) = engine(
            FixedIndex::new(vec![
                hit("general overview", 0.55),
                hit_with_file(KEYWORD_CONTENT, "pricing.pdf", 0.50),
                hit("unrelated footer", 0.0),
            ]),
            no_rerank(2),
        );

        let results = engine.search("pricing").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate.content, KEYWORD_CONTENT);
        assert_eq!(results[1].candidate.content, "general overview");
        assert!(results[0].combined_score > results[1].combined_score);
    }

    #[tokio::test]
    async fn test_over_fetches_and_truncates() {
        let hits = (0..10)
            .map(|i| hit(&format!("doc {i}"), f64::from(10 - i) / 10.0))
            .collect();
        let (engine, index) = engine(FixedIndex::new(hits), HybridSearchConfig::default().with_top_k(3));

        let results = engine.search("doc").await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(*index.requested.lock().unwrap(), vec![6]);
    }

    #[tokio::test]
    async fn test_ties_keep_retrieval_order() {
        let (engine, _) = engine(
            FixedIndex::new(vec![hit("first", 0.4), hit("second", 0.4), hit("third", 0.4)]),
            no_rerank(3),
        );

        let results = engine.search("nothing matches").await.unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.candidate.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert!(results.iter().all(|r| (r.semantic_score - 1.0).abs() < 1e-12));
    }

    #[tokio::test]
    async fn test_blank_query_rejected_before_io() {
        let (engine, index) = engine(FixedIndex::new(vec![hit("a", 0.5)]), no_rerank(2));
        let err = engine.search("   ").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidQuery(_)));
        assert!(index.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts() {
        let index = Arc::new(FixedIndex::new(vec![hit("a", 0.5)]));
        let engine = HybridSearchEngine::new(
            index.clone(),
            Arc::new(FixedEmbedder { fail: true }),
            no_rerank(2),
        )
        .unwrap();

        let err = engine.search("query").await.unwrap_err();
        assert!(err.is_embedding_failure());
        assert!(index.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_failure_aborts() {
        let mut index = FixedIndex::new(vec![hit("a", 0.5)]);
        index.fail = true;
        let (engine, _) = engine(index, no_rerank(2));

        let err = engine.search("query").await.unwrap_err();
        assert!(err.is_index_failure());
    }

    #[tokio::test]
    async fn test_non_finite_candidates_are_skipped() {
        let (engine, _) = engine(
            FixedIndex::new(vec![hit("broken", f64::NAN), hit("fine", 0.3)]),
            no_rerank(2),
        );

        let results = engine.search("fine").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate.content, "fine");
    }

    #[tokio::test]
    async fn test_empty_pool_yields_no_results() {
        let (engine, _) = engine(FixedIndex::new(Vec::new()), HybridSearchConfig::default());
        assert!(engine.search("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rerank_boosts_site_context() {
        let mut metadata = Metadata::new();
        metadata.insert("navigation_links".to_string(), json!(["/about"]));
        let with_nav = VectorHit {
            content: "welcome".to_string(),
            metadata,
            score: 0.5,
        };
        let (engine, _) = engine(
            FixedIndex::new(vec![hit("plain", 0.6), with_nav, hit("footer", 0.0)]),
            HybridSearchConfig::default().with_top_k(2),
        );

        let hits = engine
            .search_hits("about this site", engine.config())
            .await
            .unwrap();
        assert_eq!(hits[0].content, "welcome");
        assert!((hits[0].breakdown.context_boost - 0.25).abs() < 1e-12);
        assert!(hits[1].breakdown.context_boost.abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_per_call_config_is_validated() {
        let (engine, _) = engine(FixedIndex::new(vec![hit("a", 0.5)]), no_rerank(2));
        let bad = HybridSearchConfig::default().with_top_k(0);
        let err = engine.search_with("query", &bad).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }
}
