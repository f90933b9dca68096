//! Process-local vector index using exhaustive cosine similarity.

use tokio::sync::RwLock;

use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::storage::vector_index::{IndexFuture, IndexedChunk, VectorHit, VectorIndex};

/// In-memory index for tests and small corpora.
///
/// Hits with non-positive similarity are dropped.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    rows: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryVectorIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn add(&self, chunks: Vec<IndexedChunk>) -> IndexFuture<'_, RagResult<()>> {
        Box::pin(async move {
            let mut rows = self.rows.write().await;
            let expected = rows
                .first()
                .map(|row| row.embedding.len())
                .or_else(|| chunks.first().map(|chunk| chunk.embedding.len()));

            if let Some(expected) = expected
                && let Some(bad) = chunks.iter().find(|c| c.embedding.len() != expected)
            {
                return Err(RagError::Index(format!(
                    "chunk {} has {} dims, index expects {expected}",
                    bad.id,
                    bad.embedding.len()
                )));
            }

            rows.extend(chunks);
            Ok(())
        })
    }

    fn search(
        &self,
        query_vector: &[f64],
        limit: usize,
    ) -> IndexFuture<'_, RagResult<Vec<VectorHit>>> {
        let query_vector = query_vector.to_vec();
        Box::pin(async move {
            let rows = self.rows.read().await;
            if let Some(first) = rows.first()
                && first.embedding.len() != query_vector.len()
            {
                return Err(RagError::Index(format!(
                    "query has {} dims, index expects {}",
                    query_vector.len(),
                    first.embedding.len()
                )));
            }

            let mut scored: Vec<(f64, &IndexedChunk)> = rows
                .iter()
                .map(|row| (cosine_similarity(&query_vector, &row.embedding), row))
                .filter(|(similarity, _)| *similarity > 0.0)
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.truncate(limit);

            Ok(scored
                .into_iter()
                .map(|(score, row)| VectorHit {
                    content: row.content.clone(),
                    metadata: row.metadata.clone(),
                    score,
                })
                .collect())
        })
    }

    fn delete_all(&self) -> IndexFuture<'_, RagResult<()>> {
        Box::pin(async move {
            self.rows.write().await.clear();
            Ok(())
        })
    }

    fn count(&self) -> IndexFuture<'_, RagResult<usize>> {
        Box::pin(async move { Ok(self.rows.read().await.len()) })
    }
}

/// Cosine similarity, `0.0` when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::core::candidate::Metadata;
    use crate::rag::core::ids::ChunkId;

    fn chunk(content: &str, embedding: Vec<f64>) -> IndexedChunk {
        IndexedChunk {
            id: ChunkId::new(),
            content: content.to_string(),
            metadata: Metadata::new(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = InMemoryVectorIndex::new();
        index
            .add(vec![
                chunk("far", vec![0.2, 1.0]),
                chunk("near", vec![1.0, 0.1]),
                chunk("opposite", vec![-1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "far"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let index = InMemoryVectorIndex::new();
        index
            .add((0..5).map(|i| chunk(&i.to_string(), vec![1.0, 0.1])).collect())
            .await
            .unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_index_error() {
        let index = InMemoryVectorIndex::new();
        index.add(vec![chunk("a", vec![1.0, 0.0])]).await.unwrap();

        let err = index.search(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(err.is_index_failure());

        let err = index.add(vec![chunk("b", vec![1.0])]).await.unwrap_err();
        assert!(err.is_index_failure());
    }

    #[tokio::test]
    async fn test_count_and_delete_all() {
        let index = InMemoryVectorIndex::new();
        index
            .add(vec![chunk("a", vec![1.0]), chunk("b", vec![0.5])])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        index.delete_all().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[1.0], 5).await.unwrap().is_empty());
    }
}
