//! Ingestion: document loading, metadata join and chunking.

pub mod chunkers;
pub mod document;
pub mod loaders;
pub mod metadata_join;

pub use chunkers::{Chunker, ChunkerRegistry, FixedChunker, MIN_CHUNK_CHARS, RecursiveChunker};
pub use document::{Chunk, Document, base_metadata};
pub use loaders::{
    DocumentLoader, HtmlLoader, JsonLoader, LoaderRegistry, MarkdownLoader, TextLoader,
};
pub use metadata_join::{JoinRule, MetadataJoin};
