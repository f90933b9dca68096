//! Fuzzy join of loaded documents with crawler metadata records.
//!
//! Records are indexed under several keys (file stem, stem without `.html`,
//! URL path, last URL segment). A lookup tries a fixed list of rules in
//! order and stops at the first hit. Keys are kept sorted so the substring
//! fallback always picks the same record.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use url::Url;

use crate::rag::core::candidate::Metadata;
use crate::rag::core::errors::RagResult;
use crate::rag::ingest::document::Document;

const HASH_PREFIX_MIN_CHARS: usize = 9;

/// Rule that produced a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinRule {
    /// Document stem equals a key.
    ExactStem,
    /// Document stem with `.html` removed or added equals a key.
    HtmlVariant,
    /// Document `source_url` equals a record URL.
    SourceUrl,
    /// A name derived from the stem (numeric suffix, hash prefix, last
    /// segment removed) equals a key.
    DerivedName,
    /// Stem and key contain one another.
    Substring,
}

/// Index of metadata records for fuzzy lookup.
#[derive(Clone, Debug, Default)]
pub struct MetadataJoin {
    by_key: BTreeMap<String, Metadata>,
    by_url: BTreeMap<String, Metadata>,
}

impl MetadataJoin {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` object in `dir`. Unreadable files are skipped.
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be listed.
    pub fn from_dir(dir: &Path) -> RagResult<Self> {
        let mut join = Self::new();
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let parsed = fs::read_to_string(&path)
                .map_err(|err| err.to_string())
                .and_then(|raw| serde_json::from_str::<Metadata>(&raw).map_err(|err| err.to_string()));
            match parsed {
                Ok(record) => join.insert(stem, record),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping metadata record");
                }
            }
        }
        debug!(dir = %dir.display(), keys = join.len(), "metadata records indexed");
        Ok(join)
    }

    /// Index a record under its stem and URL-derived keys.
    pub fn insert(&mut self, stem: &str, record: Metadata) {
        self.by_key.insert(stem.to_string(), record.clone());
        if stem.contains(".html") {
            self.by_key.insert(stem.replace(".html", ""), record.clone());
        }

        let Some(url) = record.get("url").and_then(|value| value.as_str()) else {
            return;
        };
        self.by_url.insert(url.to_string(), record.clone());
        if let Ok(parsed) = Url::parse(url) {
            let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
            if !segments.is_empty() {
                self.by_key.insert(segments.join("_"), record.clone());
            }
            if let Some(last) = segments.last() {
                let name = last.replace(".html", "").replace(".htm", "");
                if !name.is_empty() {
                    self.by_key.insert(name, record);
                }
            }
        }
    }

    /// Number of lookup keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty() && self.by_url.is_empty()
    }

    /// Find the record for a document stem and optional source URL.
    #[must_use]
    pub fn lookup(&self, stem: &str, source_url: Option<&str>) -> Option<(&Metadata, JoinRule)> {
        if let Some(record) = self.by_key.get(stem) {
            return Some((record, JoinRule::ExactStem));
        }

        let html_variant = if stem.contains(".html") {
            stem.replace(".html", "")
        } else {
            format!("{stem}.html")
        };
        if let Some(record) = self.by_key.get(&html_variant) {
            return Some((record, JoinRule::HtmlVariant));
        }

        if let Some(record) = source_url.and_then(|url| self.by_url.get(url)) {
            return Some((record, JoinRule::SourceUrl));
        }

        for name in derived_names(stem) {
            if let Some(record) = self.by_key.get(&name) {
                return Some((record, JoinRule::DerivedName));
            }
        }

        if stem.is_empty() {
            return None;
        }
        self.by_key
            .iter()
            .find(|(key, _)| key.contains(stem) || stem.contains(key.as_str()))
            .map(|(_, record)| (record, JoinRule::Substring))
    }

    /// Merge the matching record into `document`. Returns the rule that matched.
    pub fn apply(&self, document: &mut Document) -> Option<JoinRule> {
        let stem = document.stem()?.to_string();
        let source_url = document
            .metadata
            .get("source_url")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let (record, rule) = self.lookup(&stem, source_url.as_deref())?;
        document.merge_metadata(record);
        debug!(stem, ?rule, "metadata joined");
        Some(rule)
    }
}

/// Names derived from a stem: without a `_<digits>` suffix, without a long
/// leading hash segment, and the last `_` segment.
fn derived_names(stem: &str) -> Vec<String> {
    let base = match stem.rsplit_once('_') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => stem,
    };

    let mut names = vec![base.to_string()];
    let segments: Vec<&str> = base.split('_').collect();
    if segments.len() > 1 {
        if segments[0].chars().count() >= HASH_PREFIX_MIN_CHARS {
            names.push(segments[1..].join("_"));
        }
        if let Some(last) = segments.last() {
            names.push((*last).to_string());
        }
    }
    names.retain(|name| !name.is_empty() && name != stem);
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(url: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("url".to_string(), json!(url));
        metadata
    }

    fn url_of(found: Option<(&Metadata, JoinRule)>) -> Option<(String, JoinRule)> {
        found.map(|(record, rule)| {
            (
                record.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                rule,
            )
        })
    }

    #[test]
    fn test_exact_stem_and_html_variants() {
        let mut join = MetadataJoin::new();
        join.insert("about.html", record("https://example.com/company/about.html"));
        join.insert("team", record("https://example.com/team"));

        assert_eq!(
            url_of(join.lookup("about.html", None)),
            Some(("https://example.com/company/about.html".to_string(), JoinRule::ExactStem))
        );
        // "about" is indexed via the `.html`-stripped stem and the URL segment.
        assert_eq!(url_of(join.lookup("about", None)).unwrap().1, JoinRule::ExactStem);
        assert_eq!(url_of(join.lookup("team.html", None)).unwrap().1, JoinRule::HtmlVariant);
    }

    #[test]
    fn test_url_path_key() {
        let mut join = MetadataJoin::new();
        join.insert("page_1", record("https://example.com/docs/intro/setup.html"));
        assert_eq!(
            url_of(join.lookup("docs_intro_setup.html", None)).unwrap().1,
            JoinRule::ExactStem
        );
    }

    #[test]
    fn test_source_url() {
        let mut join = MetadataJoin::new();
        join.insert("x", record("https://example.com/"));
        assert_eq!(
            url_of(join.lookup("unrelated", Some("https://example.com/"))).unwrap().1,
            JoinRule::SourceUrl
        );
    }

    #[test]
    fn test_derived_names() {
        let mut join = MetadataJoin::new();
        join.insert("sample-3pp", record("https://example.com/sample.html"));

        assert_eq!(
            url_of(join.lookup("a1b2c3d4e5_sample-3pp_2", None)).unwrap().1,
            JoinRule::DerivedName
        );
        assert_eq!(derived_names("report_12"), vec!["report"]);
        assert_eq!(derived_names("0123456789_user_guide"), vec!["user_guide", "guide"]);
        assert_eq!(derived_names("short_name"), vec!["name"]);
    }

    #[test]
    fn test_substring_fallback_is_deterministic() {
        let mut join = MetadataJoin::new();
        join.insert("pricing-table-b", record("https://b.example.com/"));
        join.insert("pricing-table-a", record("https://a.example.com/"));

        assert_eq!(
            url_of(join.lookup("pricing-table", None)),
            Some(("https://a.example.com/".to_string(), JoinRule::Substring))
        );
        assert!(join.lookup("zzz", None).is_none());
    }

    #[test]
    fn test_apply_merges_into_document() {
        let mut join = MetadataJoin::new();
        join.insert("guide", record("https://example.com/guide"));
        let mut doc = Document::new("text", Metadata::new(), "/tmp/guide.md");
        assert_eq!(join.apply(&mut doc), Some(JoinRule::ExactStem));
        assert_eq!(doc.metadata.get("url"), Some(&json!("https://example.com/guide")));
    }

    #[test]
    fn test_from_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.json"), r#"{"url": "https://example.com/good"}"#).unwrap();
        fs::write(dir.path().join("bad.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let join = MetadataJoin::from_dir(dir.path()).unwrap();
        assert!(join.lookup("good", None).is_some());
        assert!(join.lookup("bad", None).is_none());
    }
}
