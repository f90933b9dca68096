//! Retrieval engine orchestration: ingestion, search and index maintenance.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::rag::core::candidate::SearchHit;
use crate::rag::core::config::{HybridSearchConfig, RagConfig};
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::embedding::embedder::{Embedder, create_embedder};
use crate::rag::enrichment::enricher::ResultEnricher;
use crate::rag::enrichment::site_context::SiteContextEnricher;
use crate::rag::ingest::chunkers::ChunkerRegistry;
use crate::rag::ingest::document::Chunk;
use crate::rag::ingest::loaders::LoaderRegistry;
use crate::rag::ingest::metadata_join::MetadataJoin;
use crate::rag::retrieval::hybrid_search::HybridSearchEngine;
use crate::rag::storage::factory::create_vector_index;
use crate::rag::storage::vector_index::{IndexedChunk, VectorIndex};

/// Chunks embedded per provider call during ingestion.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Backend dependencies for the engine.
pub struct RagBackends {
    /// Vector index implementation.
    pub index: Arc<dyn VectorIndex>,
    /// Embedding model wrapper.
    pub embedder: Arc<dyn Embedder>,
    /// Optional result enricher.
    pub enricher: Option<Arc<dyn ResultEnricher>>,
}

impl RagBackends {
    /// Build the backends selected in `config`.
    ///
    /// # Errors
    /// Returns an error if the embedder or the index cannot be initialized.
    pub async fn from_config(config: &RagConfig) -> RagResult<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index = create_vector_index(&config.vector_store, config.embedding.ndims).await?;
        let enricher = config
            .data_source
            .site_context_dir
            .as_ref()
            .map(|dir| Arc::new(SiteContextEnricher::new(dir.clone())) as Arc<dyn ResultEnricher>);
        Ok(Self {
            index,
            embedder,
            enricher,
        })
    }
}

/// Outcome of an ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents loaded.
    pub documents: usize,
    /// Chunks embedded and added to the index.
    pub chunks: usize,
    /// Paths skipped (unsupported, unreadable or empty).
    pub skipped: usize,
}

/// Retrieval engine over one vector index.
pub struct RagEngine {
    config: RagConfig,
    search: HybridSearchEngine,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    enricher: Option<Arc<dyn ResultEnricher>>,
    loaders: LoaderRegistry,
    chunkers: ChunkerRegistry,
    metadata_join: Option<MetadataJoin>,
}

impl RagEngine {
    /// Create a new engine.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the embedder does
    /// not produce the configured dimensionality.
    pub fn new(config: RagConfig, backends: RagBackends) -> RagResult<Self> {
        config.validate()?;
        if backends.embedder.ndims() != config.embedding.ndims {
            return Err(RagError::InvalidConfig(format!(
                "embedder produces {} dims, embedding.ndims is {}",
                backends.embedder.ndims(),
                config.embedding.ndims
            )));
        }

        let search = HybridSearchEngine::new(
            Arc::clone(&backends.index),
            Arc::clone(&backends.embedder),
            config.hybrid_search.clone(),
        )?;
        let chunkers = ChunkerRegistry::from_config(&config.chunking)?;
        let loaders = LoaderRegistry::with_defaults(config.data_source.metadata_dir.clone());
        let metadata_join = config
            .data_source
            .metadata_dir
            .as_deref()
            .and_then(|dir| match MetadataJoin::from_dir(dir) {
                Ok(join) => Some(join),
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "metadata directory unavailable");
                    None
                }
            });

        info!(
            backend = backends.index.name(),
            chunkers = ?chunkers.names(),
            enrich = backends.enricher.is_some(),
            "rag engine ready"
        );

        Ok(Self {
            config,
            search,
            index: backends.index,
            embedder: backends.embedder,
            enricher: backends.enricher,
            loaders,
            chunkers,
            metadata_join,
        })
    }

    /// Create an engine with backends built from `config`.
    ///
    /// # Errors
    /// Returns an error if backends cannot be initialized.
    pub async fn from_config(config: RagConfig) -> RagResult<Self> {
        let backends = RagBackends::from_config(&config).await?;
        Self::new(config, backends)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load, chunk, embed and index the given files.
    ///
    /// Files that cannot be loaded are skipped. Embedding and index failures
    /// abort the run; batches added before the failure stay indexed.
    ///
    /// # Errors
    /// Returns an error if embedding or indexing fails.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> RagResult<IngestReport> {
        let (mut documents, skipped) = self.loaders.load_all(paths);
        if let Some(join) = &self.metadata_join {
            let matched = documents
                .iter_mut()
                .filter_map(|document| join.apply(document))
                .count();
            debug!(matched, documents = documents.len(), "metadata join applied");
        }

        let chunks = self.chunkers.chunk_documents(&documents);
        let mut report = IngestReport {
            documents: documents.len(),
            chunks: 0,
            skipped,
        };
        if chunks.is_empty() {
            warn!(paths = paths.len(), "no chunks produced");
            return Ok(report);
        }

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            report.chunks += self.index_batch(batch).await?;
        }

        info!(
            documents = report.documents,
            chunks = report.chunks,
            skipped = report.skipped,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn index_batch(&self, batch: &[Chunk]) -> RagResult<usize> {
        let texts = batch.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self.embedder.embed_texts(texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::Index(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                batch.len()
            )));
        }

        let rows: Vec<IndexedChunk> = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk {
                id: chunk.id,
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                embedding: embedding.vec,
            })
            .collect();
        let added = rows.len();
        self.index.add(rows).await?;
        Ok(added)
    }

    /// Ingest every supported file directly inside `dir` (not recursive).
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be listed, or if ingestion fails.
    pub async fn ingest_dir(&self, dir: &Path) -> RagResult<IngestReport> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.loaders.supports(path))
            .collect();
        paths.sort();
        info!(dir = %dir.display(), files = paths.len(), "ingesting directory");
        self.ingest_paths(&paths).await
    }

    /// Resolve client-supplied paths against `data_source.documents_dir`.
    ///
    /// Relative paths are joined to the directory. Every path is canonicalized
    /// and must stay inside the canonical directory.
    ///
    /// # Errors
    /// Returns `RagError::InvalidConfig` if no documents directory is
    /// configured, a path cannot be resolved, or a path leaves the directory.
    pub fn resolve_ingest_paths(&self, paths: &[PathBuf]) -> RagResult<Vec<PathBuf>> {
        let Some(dir) = self.config.data_source.documents_dir.as_deref() else {
            return Err(RagError::InvalidConfig(
                "ingesting by path requires data_source.documents_dir".to_string(),
            ));
        };
        let root = dir.canonicalize().map_err(|err| {
            RagError::InvalidConfig(format!("documents_dir {}: {err}", dir.display()))
        })?;

        paths
            .iter()
            .map(|path| {
                let joined = if path.is_absolute() {
                    path.clone()
                } else {
                    root.join(path)
                };
                let resolved = joined.canonicalize().map_err(|err| {
                    RagError::InvalidConfig(format!("cannot resolve {}: {err}", path.display()))
                })?;
                if resolved.starts_with(&root) {
                    Ok(resolved)
                } else {
                    warn!(path = %path.display(), "rejected path outside documents_dir");
                    Err(RagError::InvalidConfig(format!(
                        "{} is outside the documents directory",
                        path.display()
                    )))
                }
            })
            .collect()
    }

    /// Search with the configured ranking settings.
    ///
    /// # Errors
    /// Returns an error for a blank query, or if embedding or retrieval fails.
    pub async fn search(&self, query: &str, enrich: bool) -> RagResult<Vec<SearchHit>> {
        self.search_with(query, &self.config.hybrid_search, enrich)
            .await
    }

    /// Search with per-call ranking settings.
    ///
    /// Enrichment may read files and runs on the blocking thread pool.
    ///
    /// # Errors
    /// Returns an error for a blank query or invalid settings, or if embedding
    /// or retrieval fails.
    pub async fn search_with(
        &self,
        query: &str,
        config: &HybridSearchConfig,
        enrich: bool,
    ) -> RagResult<Vec<SearchHit>> {
        let hits = self.search.search_hits(query, config).await?;
        match (&self.enricher, enrich) {
            (Some(enricher), true) => {
                debug!(enricher = enricher.name(), "enriching results");
                let enricher = Arc::clone(enricher);
                Ok(tokio::task::spawn_blocking(move || enricher.enrich(hits)).await?)
            }
            _ => Ok(hits),
        }
    }

    /// Remove every chunk from the index.
    ///
    /// # Errors
    /// Returns an error if the index fails.
    pub async fn clear(&self) -> RagResult<()> {
        info!(backend = self.index.name(), "clearing vector index");
        self.index.delete_all().await
    }

    /// Number of indexed chunks.
    ///
    /// # Errors
    /// Returns an error if the index fails.
    pub async fn count(&self) -> RagResult<usize> {
        self.index.count().await
    }
}
