//! Error types for the retrieval subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Retrieval subsystem error type.
#[derive(Debug, Error)]
pub enum RagError {
    /// Blank or otherwise unusable query, rejected before any I/O.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Embedding provider failure or empty embedding input.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// Vector index backend failure.
    #[error("vector index error: {0}")]
    Index(String),
    /// A document could not be read or parsed.
    #[error("failed to load {path}: {reason}")]
    DocumentLoad {
        /// Path of the offending document.
        path: PathBuf,
        /// Human readable failure reason.
        reason: String,
    },
    /// A chunking strategy rejected its input.
    #[error("chunking error: {0}")]
    Chunking(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Required `SQLite` extension not available.
    #[error("sqlite-vec extension is not available; load it before opening the sqlite index")]
    SqliteVecUnavailable,
}

impl RagError {
    /// Whether the error originated in the vector index layer.
    #[must_use]
    pub const fn is_index_failure(&self) -> bool {
        matches!(
            self,
            Self::Index(_) | Self::Sqlite(_) | Self::TokioSqlite(_) | Self::SqliteVecUnavailable
        )
    }

    /// Whether the error originated in the embedding provider.
    #[must_use]
    pub const fn is_embedding_failure(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::HttpClient(_))
    }
}

/// Convenience result alias for retrieval operations.
pub type RagResult<T> = Result<T, RagError>;
