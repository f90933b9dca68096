//! Embedding model modules.

pub mod embedder;
pub mod hash_embedder;

pub use embedder::{EmbedFuture, Embedder, OllamaEmbedder, create_embedder};
pub use hash_embedder::HashEmbedder;
