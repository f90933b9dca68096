//! Selection of the vector index backend from configuration.

use std::sync::Arc;

use tracing::info;

use crate::rag::core::config::{VectorStoreConfig, VectorStoreKind};
use crate::rag::core::errors::RagResult;
use crate::rag::storage::memory_index::InMemoryVectorIndex;
use crate::rag::storage::sqlite_index::SqliteVectorIndex;
use crate::rag::storage::vector_index::VectorIndex;

/// Build the vector index selected by `config.kind`.
///
/// # Errors
/// Returns an error if the selected backend cannot be opened.
pub async fn create_vector_index(
    config: &VectorStoreConfig,
    ndims: usize,
) -> RagResult<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.kind {
        VectorStoreKind::InMemory => Arc::new(InMemoryVectorIndex::new()),
        VectorStoreKind::Sqlite => {
            Arc::new(SqliteVectorIndex::open(&config.sqlite_path, &config.table, ndims).await?)
        }
    };
    info!(backend = index.name(), "vector index initialized");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_in_memory_index() {
        let config = VectorStoreConfig {
            kind: VectorStoreKind::InMemory,
            ..VectorStoreConfig::default()
        };
        let index = create_vector_index(&config, 8).await.unwrap();
        assert_eq!(index.name(), "in_memory");
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_creates_sqlite_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            kind: VectorStoreKind::Sqlite,
            sqlite_path: dir.path().join("index.sqlite"),
            table: "chunks".to_string(),
        };
        let index = create_vector_index(&config, 8).await.unwrap();
        assert_eq!(index.name(), "sqlite");
    }
}
