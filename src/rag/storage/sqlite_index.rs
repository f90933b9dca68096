//! Persisted vector index using `SQLite` + sqlite-vec.
//!
//! Chunks live in a plain table (`{table}`) and their embeddings in a
//! `vec0` virtual table (`{table}_vec`) sharing the same rowid. Similarity is
//! `1 - cosine distance`.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::rag::core::candidate::Metadata;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::storage::sqlite_vec_loader::init_sqlite_vec_extension;
use crate::rag::storage::vector_index::{IndexFuture, IndexedChunk, VectorHit, VectorIndex};

/// SQLite-backed vector index.
pub struct SqliteVectorIndex {
    conn: Connection,
    table: String,
    ndims: usize,
}

struct PreparedRow {
    id: String,
    content: String,
    metadata_json: String,
    embedding_json: String,
}

impl SqliteVectorIndex {
    /// Open (or create) the index stored at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened, the table name is
    /// invalid, or sqlite-vec is unavailable.
    pub async fn open(path: &Path, table: &str, ndims: usize) -> RagResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open(path).await?;
        Self::initialize(conn, table, ndims).await
    }

    /// Open a throwaway in-memory database.
    ///
    /// # Errors
    /// Returns an error if the table name is invalid or sqlite-vec is unavailable.
    pub async fn open_in_memory(table: &str, ndims: usize) -> RagResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open_in_memory().await?;
        Self::initialize(conn, table, ndims).await
    }

    async fn initialize(conn: Connection, table: &str, ndims: usize) -> RagResult<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RagError::InvalidConfig(format!(
                "invalid sqlite table name: {table:?}"
            )));
        }
        if ndims == 0 {
            return Err(RagError::InvalidConfig(
                "sqlite index needs ndims > 0".to_string(),
            ));
        }

        let available = conn
            .call(|conn| {
                Ok(conn
                    .query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                    .is_ok())
            })
            .await?;
        if !available {
            return Err(RagError::SqliteVecUnavailable);
        }

        let table_name = table.to_string();
        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    metadata_json TEXT NOT NULL
                );
                CREATE VIRTUAL TABLE IF NOT EXISTS {table_name}_vec USING vec0(
                    embedding float[{ndims}] distance_metric=cosine
                );"
            ))?;
            Ok(())
        })
        .await?;

        debug!(table, ndims, "sqlite vector index ready");

        Ok(Self {
            conn,
            table: table.to_string(),
            ndims,
        })
    }

    fn prepare_rows(&self, chunks: Vec<IndexedChunk>) -> RagResult<Vec<PreparedRow>> {
        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.len() != self.ndims {
                return Err(RagError::Index(format!(
                    "chunk {} has {} dims, index expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.ndims
                )));
            }
            rows.push(PreparedRow {
                id: chunk.id.to_string(),
                content: chunk.content,
                metadata_json: serde_json::to_string(&chunk.metadata)?,
                embedding_json: serde_json::to_string(&chunk.embedding)?,
            });
        }
        Ok(rows)
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn add(&self, chunks: Vec<IndexedChunk>) -> IndexFuture<'_, RagResult<()>> {
        Box::pin(async move {
            let rows = self.prepare_rows(chunks)?;
            if rows.is_empty() {
                return Ok(());
            }

            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    {
                        let mut insert_doc = tx.prepare(&format!(
                            "INSERT INTO {table} (id, content, metadata_json) VALUES (?1, ?2, ?3)"
                        ))?;
                        let mut insert_vec = tx.prepare(&format!(
                            "INSERT INTO {table}_vec (rowid, embedding) VALUES (?1, ?2)"
                        ))?;
                        for row in &rows {
                            insert_doc.execute(rusqlite::params![
                                row.id,
                                row.content,
                                row.metadata_json
                            ])?;
                            let rowid = tx.last_insert_rowid();
                            insert_vec.execute(rusqlite::params![rowid, row.embedding_json])?;
                        }
                    }
                    tx.commit()?;
                    Ok(())
                })
                .await?;
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
            if query_vector.len() != self.ndims {
                return Err(RagError::Index(format!(
                    "query has {} dims, index expects {}",
                    query_vector.len(),
                    self.ndims
                )));
            }
            if limit == 0 {
                return Ok(Vec::new());
            }

            let query_json = serde_json::to_string(&query_vector)?;
            let k = i64::try_from(limit).unwrap_or(i64::MAX);
            let table = self.table.clone();
            let raw = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "WITH knn AS (
                            SELECT rowid, distance FROM {table}_vec
                            WHERE embedding MATCH ?1 AND k = ?2
                        )
                        SELECT d.content, d.metadata_json, knn.distance
                        FROM knn JOIN {table} AS d ON d.rowid = knn.rowid
                        ORDER BY knn.distance"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![query_json, k], |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, f64>(2)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            let mut hits = Vec::with_capacity(raw.len());
            for (content, metadata_json, distance) in raw {
                let metadata: Metadata = match serde_json::from_str(&metadata_json) {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        warn!(error = %err, "skipping stored chunk with malformed metadata");
                        continue;
                    }
                };
                hits.push(VectorHit {
                    content,
                    metadata,
                    score: 1.0 - distance,
                });
            }
            Ok(hits)
        })
    }

    fn delete_all(&self) -> IndexFuture<'_, RagResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute_batch(&format!(
                        "DELETE FROM {table}; DELETE FROM {table}_vec;"
                    ))?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn count(&self) -> IndexFuture<'_, RagResult<usize>> {
        Box::pin(async move {
            let table = self.table.clone();
            let count = self
                .conn
                .call(move |conn| {
                    let count: i64 =
                        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                            row.get(0)
                        })?;
                    Ok(count)
                })
                .await?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}
