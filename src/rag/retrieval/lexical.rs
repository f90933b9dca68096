//! Lexical match scoring over the semantically retrieved pool.
//!
//! This is not a keyword index: it only re-scores candidates the vector
//! index already returned. Scores combine term presence, term frequency and
//! matches in the `file_name` / `url` metadata fields:
//!
//! ```text
//! 0.5 * matches / |terms| + 0.3 * min(freq / (|terms| * 5), 1) + min(meta / |terms|, 0.3)
//! ```
//!
//! clamped to `[0, 1]`, and `0` when no term occurs in the content.
//!
//! When the query names a file type (`pdf`, `docx`, ...), file names with that
//! extension found in the pool's content are added as extra terms so that a
//! query like "sample pdf" also matches `sample-3pp`.

use rayon::prelude::*;
use regex::Regex;

use crate::rag::core::candidate::Candidate;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::core::query::QueryTerms;

/// File extensions that trigger term expansion when used as a query term.
pub const FILENAME_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "doc", "pptx", "xlsx", "csv", "json", "html", "htm", "txt", "md",
];

/// Metadata fields searched for term occurrences.
pub const METADATA_FIELDS: &[&str] = &["file_name", "url"];

const MAX_EXPANSIONS_PER_CANDIDATE: usize = 3;
const MIN_EXPANDED_STEM_CHARS: usize = 4;
const PRESENCE_WEIGHT: f64 = 0.5;
const FREQUENCY_WEIGHT: f64 = 0.3;
const FREQUENCY_SATURATION: f64 = 5.0;
const METADATA_BOOST_CAP: f64 = 0.3;

/// Query terms plus file-name expansions, deduplicated, originals first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpandedTerms {
    terms: Vec<String>,
}

impl ExpandedTerms {
    fn push(&mut self, term: String) {
        if !self.terms.contains(&term) {
            self.terms.push(term);
        }
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

    /// Whether there is nothing to match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<&QueryTerms> for ExpandedTerms {
    fn from(terms: &QueryTerms) -> Self {
        let mut expanded = Self::default();
        for term in terms.iter() {
            expanded.push(term.to_string());
        }
        expanded
    }
}

/// Raw match counts for one candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LexicalMatch {
    /// Distinct terms occurring in the content.
    pub content_matches: usize,
    /// Total occurrences of all terms in the content.
    pub content_frequency: usize,
    /// Distinct terms occurring in the selected metadata fields.
    pub metadata_matches: usize,
}

impl LexicalMatch {
    /// Count term occurrences in a candidate's content and metadata.
    #[must_use]
    pub fn count(terms: &ExpandedTerms, candidate: &Candidate) -> Self {
        let content = candidate.content.to_lowercase();
        let mut metadata_text = String::new();
        for field in METADATA_FIELDS {
            if let Some(value) = candidate.metadata_str(field) {
                metadata_text.push(' ');
                metadata_text.push_str(&value.to_lowercase());
            }
        }

        let mut counts = Self::default();
        for term in terms.iter() {
            let occurrences = content.matches(term).count();
            if occurrences > 0 {
                counts.content_matches += 1;
                counts.content_frequency += occurrences;
            }
            if !metadata_text.is_empty() && metadata_text.contains(term) {
                counts.metadata_matches += 1;
            }
        }
        counts
    }

    /// Combine the counts into a score in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Term and occurrence counts are small.
    pub fn score(&self, term_count: usize) -> f64 {
        if self.content_matches == 0 || term_count == 0 {
            return 0.0;
        }

        let terms = term_count as f64;
        let presence = self.content_matches as f64 / terms;
        let frequency = (self.content_frequency as f64 / (terms * FREQUENCY_SATURATION)).min(1.0);
        let metadata = (self.metadata_matches as f64 / terms).min(METADATA_BOOST_CAP);

        PRESENCE_WEIGHT
            .mul_add(presence, FREQUENCY_WEIGHT.mul_add(frequency, metadata))
            .clamp(0.0, 1.0)
    }
}

/// Lexical scorer with a precompiled file-name pattern.
#[derive(Clone, Debug)]
pub struct LexicalScorer {
    filename_pattern: Regex,
}

impl LexicalScorer {
    /// Compile the file-name pattern for `FILENAME_EXTENSIONS`.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> RagResult<Self> {
        let pattern = format!(r"(?i)([\w-]+)\.({})\b", FILENAME_EXTENSIONS.join("|"));
        let filename_pattern = Regex::new(&pattern)
            .map_err(|err| RagError::InvalidConfig(format!("invalid regex: {err}")))?;
        Ok(Self { filename_pattern })
    }

    /// Add file names referenced in the pool when the query names a file type.
    ///
    /// Original query terms are always kept. At most three names per
    /// candidate are added, and stems shorter than four characters are ignored.
    #[must_use]
    pub fn expand(&self, terms: &QueryTerms, pool: &[Candidate]) -> ExpandedTerms {
        let mut expanded = ExpandedTerms::from(terms);
        let referenced = referenced_extensions(terms);
        if referenced.is_empty() {
            return expanded;
        }

        for candidate in pool {
            let content = candidate.content.to_lowercase();
            let names = self
                .filename_pattern
                .captures_iter(&content)
                .filter(|caps| {
                    caps.get(2)
                        .is_some_and(|ext| referenced.iter().any(|r| *r == ext.as_str()))
                })
                .take(MAX_EXPANSIONS_PER_CANDIDATE)
                .filter_map(|caps| caps.get(1).map(|stem| stem.as_str().to_string()))
                .filter(|stem| stem.chars().count() >= MIN_EXPANDED_STEM_CHARS)
                .collect::<Vec<_>>();
            for name in names {
                expanded.push(name);
            }
        }
        expanded
    }

    /// Score every candidate of the pool against the (expanded) query terms.
    ///
    /// Returns one score per candidate, in pool order. Empty terms score
    /// every candidate `0.0` without scanning the pool.
    #[must_use]
    pub fn score_pool(&self, terms: &QueryTerms, pool: &[Candidate]) -> Vec<f64> {
        if terms.is_empty() {
            return vec![0.0; pool.len()];
        }

        let expanded = self.expand(terms, pool);
        let term_count = expanded.len();
        pool.par_iter()
            .map(|candidate| LexicalMatch::count(&expanded, candidate).score(term_count))
            .collect()
    }
}

fn referenced_extensions(terms: &QueryTerms) -> Vec<&'static str> {
    FILENAME_EXTENSIONS
        .iter()
        .copied()
        .filter(|ext| {
            terms.iter().any(|term| {
                term == *ext
                    || term
                        .strip_suffix(ext)
                        .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::core::candidate::Metadata;
    use serde_json::json;

    fn candidate(content: &str) -> Candidate {
        Candidate::new(content, Metadata::new(), 0.5)
    }

    fn candidate_with(content: &str, key: &str, value: &str) -> Candidate {
        let mut metadata = Metadata::new();
        metadata.insert(key.to_string(), json!(value));
        Candidate::new(content, metadata, 0.5)
    }

    fn scorer() -> LexicalScorer {
        LexicalScorer::new().unwrap()
    }

    #[test]
    fn test_empty_query_scores_zero_without_expansion() {
        let pool = vec![candidate("anything.pdf at all"), candidate("more text")];
        let terms = QueryTerms::from_text("");
        assert!(scorer().expand(&terms, &pool).is_empty());
        assert_eq!(scorer().score_pool(&terms, &pool), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pdf_query_expands_file_names() {
        let pool = vec![candidate("Download sample-3pp.pdf here")];
        let terms = QueryTerms::from_text("sample pdf");
        let expanded = scorer().expand(&terms, &pool);

        assert!(expanded.contains("sample"));
        assert!(expanded.contains("pdf"));
        assert!(expanded.contains("sample-3pp"));

        let counts = LexicalMatch::count(&expanded, &pool[0]);
        assert!(counts.content_matches >= 2);

        let score = scorer().score_pool(&terms, &pool)[0];
        assert!(score > 0.5 * 2.0 / 3.0);
    }

    #[test]
    fn test_expansion_is_case_insensitive() {
        let pool = vec![candidate("See ANNUAL-Report.PDF for details")];
        let expanded = scorer().expand(&QueryTerms::from_text("report pdf"), &pool);
        assert!(expanded.contains("annual-report"));
    }

    #[test]
    fn test_expansion_only_for_referenced_extension() {
        let pool = vec![candidate("Grab handbook.docx or brochure.pdf")];
        let expanded = scorer().expand(&QueryTerms::from_text("docx"), &pool);
        assert!(expanded.contains("handbook"));
        assert!(!expanded.contains("brochure"));
    }

    #[test]
    fn test_no_expansion_without_file_type_term() {
        let pool = vec![candidate("Download sample-3pp.pdf here")];
        let expanded = scorer().expand(&QueryTerms::from_text("sample download"), &pool);
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn test_expansion_bounded_per_candidate() {
        let pool = vec![candidate(
            "alpha1.pdf bravo2.pdf charlie3.pdf delta4.pdf echo5.pdf",
        )];
        let expanded = scorer().expand(&QueryTerms::from_text("pdf"), &pool);
        assert_eq!(expanded.len(), 1 + 3);
        assert!(!expanded.contains("delta4"));
    }

    #[test]
    fn test_short_stems_are_ignored() {
        let pool = vec![candidate("get a.pdf or abc.pdf or abcd.pdf")];
        let expanded = scorer().expand(&QueryTerms::from_text("pdf"), &pool);
        assert!(!expanded.contains("abc"));
        assert!(expanded.contains("abcd"));
    }

    #[test]
    fn test_file_name_query_term_triggers_expansion() {
        let pool = vec![candidate("linked: pricing-sheet.pdf")];
        let expanded = scorer().expand(&QueryTerms::from_text("guide.pdf"), &pool);
        assert!(expanded.contains("pricing-sheet"));
    }

    #[test]
    fn test_no_content_match_scores_zero_even_with_metadata_match() {
        let pool = vec![candidate_with(
            "unrelated text",
            "file_name",
            "pricing.pdf",
        )];
        let score = scorer().score_pool(&QueryTerms::from_text("pricing"), &pool)[0];
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_empty_content_scores_zero() {
        let pool = vec![candidate("")];
        let score = scorer().score_pool(&QueryTerms::from_text("pricing"), &pool)[0];
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_formula_values() {
        // One of two terms present, twice: 0.5 * 1/2 + 0.3 * min(2/10, 1) = 0.31
        let pool = vec![candidate("pricing and more pricing")];
        let score = scorer().score_pool(&QueryTerms::from_text("pricing tiers"), &pool)[0];
        assert!((score - 0.31).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_boost_is_capped() {
        // Both terms in content once and in the url: 0.5 + 0.3 * 0.2 + min(1.0, 0.3)
        let pool = vec![candidate_with(
            "pricing tiers",
            "url",
            "https://example.com/pricing-tiers",
        )];
        let score = scorer().score_pool(&QueryTerms::from_text("pricing tiers"), &pool)[0];
        assert!((score - 0.86).abs() < 1e-9);
    }

    #[test]
    fn test_score_never_exceeds_one() {
        let content = "pricing ".repeat(50);
        let pool = vec![candidate_with(&content, "file_name", "pricing.pdf")];
        let score = scorer().score_pool(&QueryTerms::from_text("pricing"), &pool)[0];
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scores_follow_pool_order() {
        let pool = vec![candidate("nothing here"), candidate("pricing page")];
        let scores = scorer().score_pool(&QueryTerms::from_text("pricing"), &pool);
        assert!(scores[0].abs() < 1e-12);
        assert!(scores[1] > 0.0);
    }
}
