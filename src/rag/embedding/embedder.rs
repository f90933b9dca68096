//! Embedding model wrapper for Rig + Ollama.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use rig::providers::ollama;

use crate::rag::core::config::{EmbeddingConfig, EmbeddingProvider};
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::embedding::hash_embedder::HashEmbedder;

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding models.
///
/// Implementations are shared across concurrent searches and must only be
/// read during a call.
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    /// Returns `RagError::Embedding` if the text is blank or the provider fails.
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, RagResult<Embedding>>;
    /// Embed multiple texts.
    ///
    /// # Errors
    /// Returns `RagError::Embedding` if any text is blank or the provider fails.
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Embedding>>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

/// Reject blank embedding input before it reaches a provider.
pub(crate) fn ensure_embeddable(text: &str) -> RagResult<()> {
    if text.trim().is_empty() {
        return Err(RagError::Embedding(EmbeddingError::ProviderError(
            "cannot embed empty text".to_string(),
        )));
    }
    Ok(())
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder using Rig provider.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(RagError::from)?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
        Ok(Self {
            model,
            ndims: config.ndims,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, RagResult<Embedding>> {
        let text = text.to_string();
        Box::pin(async move {
            ensure_embeddable(&text)?;
            self.model
                .embed_text(&text)
                .await
                .map_err(RagError::Embedding)
        })
    }

    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Embedding>>> {
        Box::pin(async move {
            for text in &texts {
                ensure_embeddable(text)?;
            }
            self.model
                .embed_texts(texts)
                .await
                .map_err(RagError::Embedding)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

/// Build the embedder selected by configuration.
///
/// # Errors
/// Returns an error if the selected provider cannot be initialized.
pub fn create_embedder(config: &EmbeddingConfig) -> RagResult<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(config.ndims))),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
    }
}
