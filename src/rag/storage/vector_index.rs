//! Vector index abstraction consumed by the search engine.

use std::future::Future;
use std::pin::Pin;

use crate::rag::core::candidate::{Candidate, Metadata};
use crate::rag::core::errors::RagResult;
use crate::rag::core::ids::ChunkId;

/// Boxed future type for vector index operations.
pub type IndexFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A chunk with its embedding, ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedChunk {
    /// Chunk identifier.
    pub id: ChunkId,
    /// Chunk text.
    pub content: String,
    /// Chunk metadata.
    pub metadata: Metadata,
    /// Embedding of `content`.
    pub embedding: Vec<f64>,
}

/// Nearest-neighbor hit returned by an index.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
    /// Stored chunk text.
    pub content: String,
    /// Stored chunk metadata.
    pub metadata: Metadata,
    /// Raw similarity, higher is closer.
    pub score: f64,
}

impl From<VectorHit> for Candidate {
    fn from(hit: VectorHit) -> Self {
        Self {
            content: hit.content,
            metadata: hit.metadata,
            raw_similarity: hit.score,
        }
    }
}

/// Vector index capability: add, search, delete, count.
///
/// Indexes are shared between concurrent searches and must tolerate
/// concurrent `search` calls.
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;
    /// Store chunks with their embeddings.
    ///
    /// # Errors
    /// Returns an error if the backend cannot persist the chunks.
    fn add(&self, chunks: Vec<IndexedChunk>) -> IndexFuture<'_, RagResult<()>>;
    /// Return up to `limit` hits ordered by descending similarity.
    ///
    /// # Errors
    /// Returns an error on backend or connectivity failure.
    fn search(
        &self,
        query_vector: &[f64],
        limit: usize,
    ) -> IndexFuture<'_, RagResult<Vec<VectorHit>>>;
    /// Remove every stored chunk.
    ///
    /// # Errors
    /// Returns an error if deletion fails.
    fn delete_all(&self) -> IndexFuture<'_, RagResult<()>>;
    /// Number of stored chunks.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be queried.
    fn count(&self) -> IndexFuture<'_, RagResult<usize>>;
}
