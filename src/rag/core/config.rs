//! Configuration for the retrieval subsystem.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::rag::core::errors::{RagError, RagResult};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "HALLDYLL_RAG_";

/// Top-level configuration for the retrieval engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Ranking-fusion settings.
    pub hybrid_search: HybridSearchConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Vector index settings.
    pub vector_store: VectorStoreConfig,
    /// Chunking strategies used at ingestion.
    pub chunking: ChunkingConfig,
    /// Document and site-context locations.
    pub data_source: DataSourceConfig,
}

impl RagConfig {
    /// Load a configuration from a JSON file. Missing sections fall back to defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> RagResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Overlay `HALLDYLL_RAG_*` environment variables on top of this configuration.
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn apply_env(self) -> RagResult<Self> {
        self.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Overlay values produced by `lookup` (keyed without the env prefix).
    ///
    /// # Errors
    /// Returns an error if a value is present but cannot be parsed.
    pub fn apply_overrides<F>(mut self, lookup: F) -> RagResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TOP_K") {
            self.hybrid_search.top_k = parse_value("TOP_K", &value)?;
        }
        if let Some(value) = lookup("SEMANTIC_WEIGHT") {
            self.hybrid_search.semantic_weight = parse_value("SEMANTIC_WEIGHT", &value)?;
        }
        if let Some(value) = lookup("KEYWORD_WEIGHT") {
            self.hybrid_search.keyword_weight = parse_value("KEYWORD_WEIGHT", &value)?;
        }
        if let Some(value) = lookup("RERANK") {
            self.hybrid_search.rerank = parse_value("RERANK", &value)?;
        }
        if let Some(value) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = EmbeddingProvider::parse(&value)?;
        }
        if let Some(value) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = lookup("EMBEDDING_NDIMS") {
            self.embedding.ndims = parse_value("EMBEDDING_NDIMS", &value)?;
        }
        if let Some(value) = lookup("OLLAMA_URL") {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = lookup("STORE") {
            self.vector_store.kind = VectorStoreKind::parse(&value)?;
        }
        if let Some(value) = lookup("SQLITE_PATH") {
            self.vector_store.sqlite_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("DOCUMENTS_DIR") {
            self.data_source.documents_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("SITE_CONTEXT_DIR") {
            self.data_source.site_context_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("METADATA_DIR") {
            self.data_source.metadata_dir = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> RagResult<()> {
        self.hybrid_search.validate()?;

        if self.embedding.ndims == 0 {
            return Err(RagError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        if self.vector_store.table.trim().is_empty()
            || !self
                .vector_store
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RagError::InvalidConfig(
                "vector_store.table must be a non-empty [A-Za-z0-9_] identifier".to_string(),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::InvalidConfig(
                "chunking.chunk_overlap must be < chunking.chunk_size".to_string(),
            ));
        }

        if !self.chunking.use_fixed && !self.chunking.use_recursive {
            return Err(RagError::InvalidConfig(
                "at least one chunking strategy must be enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> RagResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| RagError::InvalidConfig(format!("{ENV_PREFIX}{key}={value}: {err}")))
}

/// Ranking-fusion settings.
///
/// Weights are applied as given; they are not normalized to sum to one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    /// Weight of the normalized vector-similarity signal.
    pub semantic_weight: f64,
    /// Weight of the lexical match signal.
    pub keyword_weight: f64,
    /// Number of results returned.
    pub top_k: usize,
    /// Whether the heuristic rerank pass runs after fusion.
    pub rerank: bool,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            top_k: 5,
            rerank: true,
        }
    }
}

impl HybridSearchConfig {
    /// Create a config with equal weighting.
    #[must_use]
    pub const fn balanced() -> Self {
        Self {
            semantic_weight: 0.5,
            keyword_weight: 0.5,
            top_k: 5,
            rerank: true,
        }
    }

    /// Create a config favoring vector similarity.
    #[must_use]
    pub const fn vector_heavy() -> Self {
        Self {
            semantic_weight: 0.8,
            keyword_weight: 0.2,
            top_k: 5,
            rerank: true,
        }
    }

    /// Create a config favoring lexical matches.
    #[must_use]
    pub const fn keyword_heavy() -> Self {
        Self {
            semantic_weight: 0.3,
            keyword_weight: 0.7,
            top_k: 5,
            rerank: true,
        }
    }

    /// Replace the result count.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Enable or disable the rerank pass.
    #[must_use]
    pub const fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    /// Number of nearest neighbors requested from the vector index.
    #[must_use]
    pub const fn fetch_limit(&self) -> usize {
        self.top_k.saturating_mul(2)
    }

    /// Validate weights and result count.
    ///
    /// # Errors
    /// Returns an error if `top_k` is zero or a weight is negative or not finite.
    pub fn validate(&self) -> RagResult<()> {
        if self.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "hybrid_search.top_k must be > 0".to_string(),
            ));
        }

        for (name, weight) in [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RagError::InvalidConfig(format!(
                    "hybrid_search.{name} must be a finite value >= 0"
                )));
            }
        }

        Ok(())
    }
}

/// Embedding provider selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Deterministic feature-hashing embedder, no network access.
    Hash,
    /// Ollama embeddings through Rig.
    Ollama,
}

impl EmbeddingProvider {
    fn parse(value: &str) -> RagResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            other => Err(RagError::InvalidConfig(format!(
                "unknown embedding provider: {other}"
            ))),
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider produces embeddings.
    pub provider: EmbeddingProvider,
    /// Ollama embedding model name.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: "nomic-embed-text".to_string(),
            ndims: 768,
            base_url: None,
        }
    }
}

/// Vector index backend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreKind {
    /// Process-local index, lost on restart.
    InMemory,
    /// `SQLite` + sqlite-vec persisted index.
    Sqlite,
}

impl VectorStoreKind {
    fn parse(value: &str) -> RagResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "memory" => Ok(Self::InMemory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(RagError::InvalidConfig(format!(
                "unknown vector store: {other}"
            ))),
        }
    }
}

/// Vector index settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Which backend stores the vectors.
    pub kind: VectorStoreKind,
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Base table name for the `SQLite` backend.
    pub table: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            kind: VectorStoreKind::Sqlite,
            sqlite_path: PathBuf::from("rag.sqlite"),
            table: "rag_chunks".to_string(),
        }
    }
}

/// Chunking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between neighboring chunks.
    pub chunk_overlap: usize,
    /// Run the fixed-window chunker.
    pub use_fixed: bool,
    /// Run the recursive separator chunker.
    pub use_recursive: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            use_fixed: true,
            use_recursive: true,
        }
    }
}

/// Locations of ingestible documents and site-context files.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Directory scanned by `RagEngine::ingest_dir` when no path is given.
    pub documents_dir: Option<PathBuf>,
    /// Base directory that `site_common` metadata paths are relative to.
    pub site_context_dir: Option<PathBuf>,
    /// Directory of per-page metadata records joined onto documents at ingestion.
    pub metadata_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HybridSearchConfig::default();
        assert!((config.semantic_weight - 0.7).abs() < f64::EPSILON);
        assert!((config.keyword_weight - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.top_k, 5);
        assert!(config.rerank);
        assert_eq!(config.fetch_limit(), 10);
    }

    #[test]
    fn test_config_presets() {
        let balanced = HybridSearchConfig::balanced();
        assert!((balanced.semantic_weight - 0.5).abs() < f64::EPSILON);
        assert!((balanced.keyword_weight - 0.5).abs() < f64::EPSILON);

        let vector = HybridSearchConfig::vector_heavy();
        assert!((vector.semantic_weight - 0.8).abs() < f64::EPSILON);

        let keyword = HybridSearchConfig::keyword_heavy();
        assert!((keyword.keyword_weight - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let config = HybridSearchConfig::default().with_top_k(0);
        assert!(matches!(config.validate(), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_negative_and_nan_weights() {
        let mut config = HybridSearchConfig::default();
        config.keyword_weight = -0.1;
        assert!(config.validate().is_err());

        config.keyword_weight = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_are_not_required_to_sum_to_one() {
        let mut config = HybridSearchConfig::default();
        config.semantic_weight = 2.0;
        config.keyword_weight = 3.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let mut config = RagConfig::default();
        config.vector_store.table = "chunks; DROP TABLE x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let config = RagConfig::default()
            .apply_overrides(|key| match key {
                "TOP_K" => Some("7".to_string()),
                "RERANK" => Some("false".to_string()),
                "STORE" => Some("in_memory".to_string()),
                "EMBEDDING_PROVIDER" => Some("hash".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.hybrid_search.top_k, 7);
        assert!(!config.hybrid_search.rerank);
        assert_eq!(config.vector_store.kind, VectorStoreKind::InMemory);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
    }

    #[test]
    fn test_override_parse_error() {
        let result = RagConfig::default().apply_overrides(|key| {
            (key == "TOP_K").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"hybrid_search": {"top_k": 3}}"#).unwrap();
        assert_eq!(config.hybrid_search.top_k, 3);
        assert!((config.hybrid_search.semantic_weight - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.chunking.chunk_size, 1000);
    }
}
