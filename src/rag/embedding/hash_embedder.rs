//! Deterministic feature-hashing embedder.
//!
//! FNV-1a hashes of unigrams and bigrams are folded into a fixed number of
//! non-negative buckets and L2 normalized. No model or network is involved, which
//! makes it suitable for offline indexes and tests. Similar wording produces
//! similar vectors; meaning does not.

use rig::embeddings::Embedding;

use crate::rag::core::errors::RagResult;
use crate::rag::embedding::embedder::{EmbedFuture, Embedder, ensure_embeddable};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BIGRAM_WEIGHT: f64 = 0.5;

/// Feature-hashing embedder.
#[derive(Clone, Debug)]
pub struct HashEmbedder {
    ndims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { ndims: 384 }
    }
}

impl HashEmbedder {
    /// Create an embedder producing `ndims`-dimensional vectors.
    #[must_use]
    pub const fn new(ndims: usize) -> Self {
        Self { ndims }
    }

    /// Embed text synchronously.
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.ndims];
        if self.ndims == 0 {
            return vector;
        }

        let tokens = tokenize(text);
        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            self.accumulate(&mut vector, &bigram, BIGRAM_WEIGHT);
        }

        l2_normalize(&mut vector);
        vector
    }

    fn accumulate(&self, vector: &mut [f64], feature: &str, weight: f64) {
        // Non-negative buckets: texts sharing a feature have a positive cosine.
        let hash = fnv1a(feature.as_bytes());
        let ndims = u64::try_from(self.ndims).unwrap_or(u64::MAX);
        let bucket = usize::try_from(hash % ndims).unwrap_or(0);
        vector[bucket] += weight;
    }
}

impl Embedder for HashEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, RagResult<Embedding>> {
        let text = text.to_string();
        Box::pin(async move {
            ensure_embeddable(&text)?;
            let vec = self.embed_sync(&text);
            Ok(Embedding {
                document: text,
                vec,
            })
        })
    }

    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Embedding>>> {
        Box::pin(async move {
            let mut embeddings = Vec::with_capacity(texts.len());
            for text in texts {
                ensure_embeddable(&text)?;
                let vec = self.embed_sync(&text);
                embeddings.push(Embedding {
                    document: text,
                    vec,
                });
            }
            Ok(embeddings)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
