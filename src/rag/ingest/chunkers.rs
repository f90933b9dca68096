//! Chunking strategies and the registry that runs the enabled ones.
//!
//! Sizes and offsets are counted in characters, not bytes.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::rag::core::config::ChunkingConfig;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::ingest::document::{Chunk, Document};

/// Chunks shorter than this (after trimming) are dropped by the registry.
pub const MIN_CHUNK_CHARS: usize = 50;

const RECURSIVE_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// A strategy for splitting a document into chunks.
pub trait Chunker: Send + Sync {
    /// Strategy name, stored as `chunking_strategy` on every chunk.
    fn name(&self) -> &'static str;

    /// Split `document` into chunks.
    ///
    /// # Errors
    /// Returns `RagError::Chunking` if the strategy cannot process the document.
    fn chunk(&self, document: &Document) -> RagResult<Vec<Chunk>>;
}

fn check_window(chunk_size: usize, chunk_overlap: usize) -> RagResult<()> {
    if chunk_size == 0 {
        return Err(RagError::Chunking("chunk_size must be > 0".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Chunking(format!(
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Fixed-size character windows, each overlapping the previous one.
#[derive(Clone, Copy, Debug)]
pub struct FixedChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedChunker {
    /// Create a fixed-size chunker.
    ///
    /// # Errors
    /// Returns an error if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> RagResult<Self> {
        check_window(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Chunker for FixedChunker {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn chunk(&self, document: &Document) -> RagResult<Vec<Chunk>> {
        let chars: Vec<char> = document.content.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let text: String = chars[start..end].iter().collect();
            let mut chunk = Chunk::from_document(document, text, self.name(), chunks.len());
            chunk.metadata.insert("chunk_size".to_string(), json!(self.chunk_size));
            chunk.metadata.insert("chunk_overlap".to_string(), json!(self.chunk_overlap));
            chunk.metadata.insert("start_position".to_string(), json!(start));
            chunk.metadata.insert("end_position".to_string(), json!(end));
            chunks.push(chunk);
            if end == chars.len() {
                break;
            }
            start += step;
        }
        Ok(chunks)
    }
}

/// Recursive splitting on paragraph, line, sentence, word and finally
/// character boundaries, merging adjacent pieces up to `chunk_size` with
/// `chunk_overlap` carried between chunks.
#[derive(Clone, Copy, Debug)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a recursive chunker.
    ///
    /// # Errors
    /// Returns an error if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> RagResult<Self> {
        check_window(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split raw text into chunk strings.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, RECURSIVE_SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|piece| !piece.is_empty()).collect()
        };

        let mut output = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                output.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                output.push(piece.to_string());
            } else {
                output.extend(self.split_with(piece, remaining));
            }
        }
        if !pending.is_empty() {
            output.extend(self.merge(&pending, separator));
        }
        output
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window, separator);
                while total > self.chunk_overlap
                    || (total > 0 && total + len + separator_len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { separator_len };
                }
            }
            let joiner = if window.is_empty() { 0 } else { separator_len };
            window.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut merged, &window, separator);
        merged
    }
}

fn push_joined(merged: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &'static str {
        "recursive"
    }

    fn chunk(&self, document: &Document) -> RagResult<Vec<Chunk>> {
        let chunks = self
            .split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut chunk = Chunk::from_document(document, text, self.name(), index);
                chunk.metadata.insert("chunk_size".to_string(), json!(self.chunk_size));
                chunk.metadata.insert("chunk_overlap".to_string(), json!(self.chunk_overlap));
                chunk
            })
            .collect();
        Ok(chunks)
    }
}

/// Enabled chunking strategies. Every strategy contributes its own chunks.
#[derive(Clone)]
pub struct ChunkerRegistry {
    chunkers: Vec<Arc<dyn Chunker>>,
    min_chunk_chars: usize,
}

impl ChunkerRegistry {
    /// Build the strategies enabled in `config`.
    ///
    /// # Errors
    /// Returns an error if the window is invalid or no strategy is enabled.
    pub fn from_config(config: &ChunkingConfig) -> RagResult<Self> {
        let mut chunkers: Vec<Arc<dyn Chunker>> = Vec::new();
        if config.use_recursive {
            chunkers.push(Arc::new(RecursiveChunker::new(
                config.chunk_size,
                config.chunk_overlap,
            )?));
        }
        if config.use_fixed {
            chunkers.push(Arc::new(FixedChunker::new(
                config.chunk_size,
                config.chunk_overlap,
            )?));
        }
        if chunkers.is_empty() {
            return Err(RagError::InvalidConfig(
                "at least one chunking strategy must be enabled".to_string(),
            ));
        }
        Ok(Self::new(chunkers))
    }

    /// Registry over explicit strategies.
    #[must_use]
    pub const fn new(chunkers: Vec<Arc<dyn Chunker>>) -> Self {
        Self {
            chunkers,
            min_chunk_chars: MIN_CHUNK_CHARS,
        }
    }

    /// Override the minimum chunk length.
    #[must_use]
    pub const fn with_min_chunk_chars(mut self, min_chunk_chars: usize) -> Self {
        self.min_chunk_chars = min_chunk_chars;
        self
    }

    /// Names of the enabled strategies, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.chunkers.iter().map(|chunker| chunker.name()).collect()
    }

    /// Run every strategy on `document`.
    ///
    /// Blank documents yield nothing. A failing strategy is logged and skipped.
    /// Chunks shorter than the minimum length are dropped.
    #[must_use]
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        if !document.has_content() {
            return Vec::new();
        }

        let mut all = Vec::new();
        for chunker in &self.chunkers {
            match chunker.chunk(document) {
                Ok(chunks) => all.extend(
                    chunks
                        .into_iter()
                        .filter(|chunk| char_len(chunk.content.trim()) >= self.min_chunk_chars),
                ),
                Err(err) => {
                    warn!(
                        strategy = chunker.name(),
                        path = %document.source_path.display(),
                        error = %err,
                        "chunking strategy failed"
                    );
                }
            }
        }
        debug!(
            path = %document.source_path.display(),
            chunks = all.len(),
            "document chunked"
        );
        all
    }

    /// Chunk several documents.
    #[must_use]
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| self.chunk_document(document))
            .collect()
    }
}
