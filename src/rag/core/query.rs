//! Query validation and tokenization.

use crate::rag::core::errors::{RagError, RagResult};

/// Distinct lower-cased whitespace tokens longer than one character,
/// in order of first appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryTerms {
    terms: Vec<String>,
}

impl QueryTerms {
    /// Tokenize free text. Blank input yields an empty set.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for token in text.to_lowercase().split_whitespace() {
            if token.chars().count() <= 1 {
                continue;
            }
            if !terms.iter().any(|existing| existing == token) {
                terms.push(token.to_string());
            }
        }
        Self { terms }
    }

    /// Iterate over the terms.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Whether a term is present.
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|existing| existing == term)
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether tokenization produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A validated, non-blank search query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    raw: String,
    terms: QueryTerms,
}

impl Query {
    /// Validate and tokenize a raw query string.
    ///
    /// # Errors
    /// Returns `RagError::InvalidQuery` if the query is empty or whitespace only.
    pub fn parse(raw: &str) -> RagResult<Self> {
        if raw.trim().is_empty() {
            return Err(RagError::InvalidQuery("query is blank".to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            terms: QueryTerms::from_text(raw),
        })
    }

    /// The query as given by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tokenized terms.
    #[must_use]
    pub const fn terms(&self) -> &QueryTerms {
        &self.terms
    }
}
