//! Core retrieval types: configuration, errors, identifiers, candidates and queries.

pub mod candidate;
pub mod config;
pub mod errors;
pub mod ids;
pub mod query;

pub use candidate::{Candidate, Metadata, ScoreBreakdown, ScoredCandidate, SearchHit};
pub use config::{
    ChunkingConfig, DataSourceConfig, EmbeddingConfig, EmbeddingProvider, HybridSearchConfig,
    RagConfig, VectorStoreConfig, VectorStoreKind,
};
pub use errors::{RagError, RagResult};
pub use ids::{ChunkId, DocumentId};
pub use query::{Query, QueryTerms};
