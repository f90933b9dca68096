//! Document loaders and the registry that selects one per file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scraper::{Html, Selector};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::rag::core::candidate::Metadata;
use crate::rag::core::errors::{RagError, RagResult};
use crate::rag::ingest::document::{Document, base_metadata};

const MAX_HTML_LINKS: usize = 50;

/// A loader for one family of file formats.
pub trait DocumentLoader: Send + Sync {
    /// Loader name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this loader understands `path`.
    fn can_handle(&self, path: &Path) -> bool;

    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns `RagError::DocumentLoad` if the file cannot be read.
    fn load(&self, path: &Path) -> RagResult<Document>;
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn has_extension(path: &Path, accepted: &[&str]) -> bool {
    extension(path).is_some_and(|ext| accepted.contains(&ext.as_str()))
}

fn load_error(path: &Path, reason: String) -> RagError {
    RagError::DocumentLoad {
        path: path.to_path_buf(),
        reason,
    }
}

fn read_text(path: &Path) -> RagResult<(String, u64)> {
    let content = fs::read_to_string(path).map_err(|err| load_error(path, err.to_string()))?;
    let size = fs::metadata(path).map(|meta| meta.len()).unwrap_or_default();
    Ok((content, size))
}

/// Look for `{stem}.json`, then `{stem}.html.json`, in `metadata_dir`.
fn load_sidecar(metadata_dir: Option<&Path>, path: &Path) -> Option<Metadata> {
    let dir = metadata_dir?;
    let stem = path.file_stem()?.to_str()?;
    let sidecar = [format!("{stem}.json"), format!("{stem}.html.json")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())?;

    let parsed = fs::read_to_string(&sidecar)
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str::<Metadata>(&raw).map_err(|err| err.to_string()));
    match parsed {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(path = %sidecar.display(), error = %err, "could not load sidecar metadata");
            None
        }
    }
}

/// Plain text files (`.txt`, `.text`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn name(&self) -> &'static str {
        "text"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["txt", "text"])
    }

    fn load(&self, path: &Path) -> RagResult<Document> {
        let (content, size) = read_text(path)?;
        Ok(Document::new(content, base_metadata("text", path, Some(size)), path))
    }
}

/// Markdown files, merged with a sidecar metadata record when one exists.
#[derive(Clone, Debug, Default)]
pub struct MarkdownLoader {
    metadata_dir: Option<PathBuf>,
}

impl MarkdownLoader {
    /// Loader looking for sidecar records in `metadata_dir`.
    #[must_use]
    pub const fn new(metadata_dir: Option<PathBuf>) -> Self {
        Self { metadata_dir }
    }
}

impl DocumentLoader for MarkdownLoader {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["md", "markdown"])
    }

    fn load(&self, path: &Path) -> RagResult<Document> {
        let (content, size) = read_text(path)?;
        let mut document = Document::new(content, base_metadata("markdown", path, Some(size)), path);
        if let Some(record) = load_sidecar(self.metadata_dir.as_deref(), path) {
            document.merge_metadata(&record);
        }
        Ok(document)
    }
}

/// JSON files.
///
/// An object with a `url` key is treated as a page metadata record: it becomes
/// the document metadata and its string fields become the text. Other JSON is
/// flattened to `key: value` lines. Unparseable files are loaded as raw text.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLoader;

impl JsonLoader {
    fn render_record(record: &Metadata) -> String {
        let mut lines = Vec::new();
        for (key, value) in record {
            match (key.as_str(), value) {
                ("site_common", Value::Object(files)) => {
                    let names: Vec<&str> = files.values().filter_map(Value::as_str).collect();
                    lines.push(format!("Site common files: {}", names.join(", ")));
                }
                ("site_common", _) => {}
                (_, Value::String(text)) => lines.push(format!("{key}: {text}")),
                _ => {}
            }
        }
        lines.join("\n")
    }

    fn render_object(object: &Metadata) -> String {
        let mut lines = Vec::new();
        for (key, value) in object {
            match value {
                Value::String(text) => lines.push(format!("{key}: {text}")),
                Value::Object(_) | Value::Array(_) => lines.push(format!("{key}: {value}")),
                _ => {}
            }
        }
        lines.join("\n")
    }

    fn render_array(items: &[Value]) -> String {
        items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn pretty(value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    }
}

impl DocumentLoader for JsonLoader {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["json"])
    }

    fn load(&self, path: &Path) -> RagResult<Document> {
        let (raw, size) = read_text(path)?;
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            debug!(path = %path.display(), "json did not parse, loading as text");
            return Ok(Document::new(raw, base_metadata("json", path, Some(size)), path));
        };

        match &value {
            Value::Object(record) if record.contains_key("url") => {
                let mut metadata = record.clone();
                metadata.extend(base_metadata("json_metadata", path, Some(size)));
                let mut content = Self::render_record(record);
                if content.is_empty() {
                    content = Self::pretty(&value);
                }
                Ok(Document::new(content, metadata, path))
            }
            _ => {
                let content = match &value {
                    Value::Object(object) => Self::render_object(object),
                    Value::Array(items) => Self::render_array(items),
                    _ => String::new(),
                };
                let content = if content.is_empty() {
                    Self::pretty(&value)
                } else {
                    content
                };
                Ok(Document::new(content, base_metadata("json", path, Some(size)), path))
            }
        }
    }
}

/// HTML files: visible body text, `title` and up to fifty `links`.
#[derive(Clone, Debug, Default)]
pub struct HtmlLoader {
    metadata_dir: Option<PathBuf>,
}

impl HtmlLoader {
    /// Loader looking for sidecar records in `metadata_dir`.
    #[must_use]
    pub const fn new(metadata_dir: Option<PathBuf>) -> Self {
        Self { metadata_dir }
    }

    fn extract_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        let title = document
            .select(&selector)
            .next()?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        (!title.is_empty()).then_some(title)
    }

    fn extract_text(document: &Html) -> String {
        let Ok(selector) = Selector::parse("body") else {
            return String::new();
        };
        let Some(body) = document.select(&selector).next() else {
            return String::new();
        };
        let skipped = Selector::parse("script, style, noscript").ok();
        let hidden: Vec<_> = skipped
            .map(|sel| body.select(&sel).map(|el| el.id()).collect())
            .unwrap_or_default();

        let mut words = Vec::new();
        for node in body.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if node.ancestors().any(|ancestor| hidden.contains(&ancestor.id())) {
                continue;
            }
            words.extend(text.split_whitespace());
        }
        words.join(" ")
    }

    fn extract_links(document: &Html) -> Vec<Value> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?.trim();
                if href.is_empty() || href.starts_with('#') {
                    return None;
                }
                let text = anchor.text().collect::<Vec<_>>().join(" ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                Some(json!({ "href": href, "text": text }))
            })
            .take(MAX_HTML_LINKS)
            .collect()
    }
}

impl DocumentLoader for HtmlLoader {
    fn name(&self) -> &'static str {
        "html"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["html", "htm"])
    }

    fn load(&self, path: &Path) -> RagResult<Document> {
        let (raw, size) = read_text(path)?;
        let html = Html::parse_document(&raw);

        let mut metadata = base_metadata("html", path, Some(size));
        if let Some(title) = Self::extract_title(&html) {
            metadata.insert("title".to_string(), json!(title));
        }
        let links = Self::extract_links(&html);
        if !links.is_empty() {
            metadata.insert("links".to_string(), Value::Array(links));
        }

        let mut document = Document::new(Self::extract_text(&html), metadata, path);
        if let Some(record) = load_sidecar(self.metadata_dir.as_deref(), path) {
            document.merge_metadata(&record);
        }
        Ok(document)
    }
}

/// Ordered set of loaders; the first one that can handle a path wins.
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    /// Registry with the built-in loaders. Markdown and HTML loaders merge
    /// sidecar records found in `metadata_dir`.
    #[must_use]
    pub fn with_defaults(metadata_dir: Option<PathBuf>) -> Self {
        Self {
            loaders: vec![
                Arc::new(MarkdownLoader::new(metadata_dir.clone())),
                Arc::new(JsonLoader),
                Arc::new(TextLoader),
                Arc::new(HtmlLoader::new(metadata_dir)),
            ],
        }
    }

    /// Empty registry.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Append a loader. Earlier loaders keep priority.
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        self.loaders.push(loader);
    }

    /// Loader for `path`, if any.
    #[must_use]
    pub fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        self.loaders
            .iter()
            .find(|loader| loader.can_handle(path))
            .map(AsRef::as_ref)
    }

    /// Whether some loader can handle `path`.
    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        self.loader_for(path).is_some()
    }

    /// Load one document.
    ///
    /// # Errors
    /// Returns `RagError::DocumentLoad` if no loader handles `path` or loading fails.
    pub fn load(&self, path: &Path) -> RagResult<Document> {
        let loader = self
            .loader_for(path)
            .ok_or_else(|| load_error(path, "no loader for this file type".to_string()))?;
        debug!(loader = loader.name(), path = %path.display(), "loading document");
        loader.load(path)
    }

    /// Load every path, skipping unsupported, unreadable and empty files.
    ///
    /// Returns the loaded documents and the number of skipped paths.
    #[must_use]
    pub fn load_all(&self, paths: &[PathBuf]) -> (Vec<Document>, usize) {
        let mut documents = Vec::with_capacity(paths.len());
        let mut skipped = 0;
        for path in paths {
            match self.load(path) {
                Ok(document) if document.has_content() => documents.push(document),
                Ok(_) => {
                    debug!(path = %path.display(), "skipping empty document");
                    skipped += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to load document");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, total = paths.len(), "some documents were not loaded");
        }
        (documents, skipped)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults(None)
    }
}
