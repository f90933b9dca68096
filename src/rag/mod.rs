//! Hybrid retrieval subsystem.
//!
//! Organized into:
//! - `core`: Configuration, errors, IDs, candidates and queries
//! - `embedding`: Embedding model abstraction with Ollama and hashing implementations
//! - `storage`: Vector index trait with in-memory and `SQLite` backends
//! - `retrieval`: Normalization, lexical scoring, fusion and rerank
//! - `ingest`: Document loaders, chunkers and the metadata join
//! - `enrichment`: Post-hoc site context enrichment
//! - `engine`: Main orchestration of ingestion and search

pub mod core;
pub mod embedding;
pub mod engine;
pub mod enrichment;
pub mod ingest;
pub mod retrieval;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{
    Candidate, ChunkId, ChunkingConfig, DataSourceConfig, DocumentId, EmbeddingConfig,
    EmbeddingProvider, HybridSearchConfig, Metadata, Query, QueryTerms, RagConfig, RagError,
    RagResult, ScoreBreakdown, ScoredCandidate, SearchHit, VectorStoreConfig, VectorStoreKind,
};
pub use embedding::{EmbedFuture, Embedder, HashEmbedder, OllamaEmbedder, create_embedder};
pub use engine::{IngestReport, RagBackends, RagEngine};
pub use enrichment::{ResultEnricher, SiteContextEnricher};
pub use ingest::{ChunkerRegistry, LoaderRegistry, MetadataJoin};
pub use retrieval::{HybridSearchEngine, LexicalScorer, normalize_scores};
pub use storage::{
    InMemoryVectorIndex, SqliteVectorIndex, VectorHit, VectorIndex, create_vector_index,
};

/// Initialize tracing with an env-filtered subscriber, `info` by default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
