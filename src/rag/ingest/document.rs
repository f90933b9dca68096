//! Loaded documents and their chunks.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::rag::core::candidate::Metadata;
use crate::rag::core::ids::{ChunkId, DocumentId};

/// A document read from disk, before chunking.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Document identifier.
    pub id: DocumentId,
    /// Extracted text.
    pub content: String,
    /// Loader metadata, possibly merged with a joined metadata record.
    pub metadata: Metadata,
    /// Path the document was loaded from.
    pub source_path: PathBuf,
}

impl Document {
    /// Create a document with a fresh id.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: DocumentId::new(),
            content: content.into(),
            metadata,
            source_path: source_path.into(),
        }
    }

    /// File stem of the source path (`guide` for `docs/guide.md`).
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        self.source_path.file_stem().and_then(|stem| stem.to_str())
    }

    /// Merge another metadata record into this document's metadata. Later keys win.
    pub fn merge_metadata(&mut self, record: &Metadata) {
        for (key, value) in record {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Whether the document has any non-whitespace text.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Metadata every loader attaches: source type, file name, size and path.
#[must_use]
pub fn base_metadata(source_type: &str, path: &Path, file_size: Option<u64>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source_type".to_string(), json!(source_type));
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        metadata.insert("file_name".to_string(), json!(name));
    }
    if let Some(size) = file_size {
        metadata.insert("file_size".to_string(), json!(size));
    }
    metadata.insert(
        "source_path".to_string(),
        Value::String(path.display().to_string()),
    );
    metadata
}

/// One piece of a document, ready to be embedded.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Chunk identifier.
    pub id: ChunkId,
    /// Parent document.
    pub document_id: DocumentId,
    /// Chunk text.
    pub content: String,
    /// Document metadata plus chunking fields.
    pub metadata: Metadata,
    /// Position within the chunks produced by one strategy.
    pub index: usize,
}

impl Chunk {
    /// Create a chunk for `document`, copying its metadata and tagging it
    /// with the strategy name and chunk index.
    #[must_use]
    pub fn from_document(document: &Document, content: String, strategy: &str, index: usize) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert("chunking_strategy".to_string(), json!(strategy));
        metadata.insert("chunk_index".to_string(), json!(index));
        Self {
            id: ChunkId::new(),
            document_id: document.id,
            content,
            metadata,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_metadata_fields() {
        let metadata = base_metadata("text", Path::new("/data/notes.txt"), Some(42));
        assert_eq!(metadata.get("source_type"), Some(&json!("text")));
        assert_eq!(metadata.get("file_name"), Some(&json!("notes.txt")));
        assert_eq!(metadata.get("file_size"), Some(&json!(42)));
        assert_eq!(metadata.get("source_path"), Some(&json!("/data/notes.txt")));
    }

    #[test]
    fn test_merge_overrides_existing_keys() {
        let mut doc = Document::new("body", base_metadata("markdown", Path::new("a.md"), None), "a.md");
        let mut record = Metadata::new();
        record.insert("url".to_string(), json!("https://example.com/a"));
        record.insert("source_type".to_string(), json!("html"));
        doc.merge_metadata(&record);

        assert_eq!(doc.metadata.get("url"), Some(&json!("https://example.com/a")));
        assert_eq!(doc.metadata.get("source_type"), Some(&json!("html")));
        assert_eq!(doc.stem(), Some("a"));
    }

    #[test]
    fn test_chunk_copies_metadata_and_tags_strategy() {
        let doc = Document::new("body", base_metadata("text", Path::new("a.txt"), None), "a.txt");
        let chunk = Chunk::from_document(&doc, "bo".to_string(), "fixed", 3);
        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.metadata.get("chunking_strategy"), Some(&json!("fixed")));
        assert_eq!(chunk.metadata.get("chunk_index"), Some(&json!(3)));
        assert_eq!(chunk.metadata.get("file_name"), Some(&json!("a.txt")));
    }
}
