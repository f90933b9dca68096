//! Site context enrichment from crawler output.
//!
//! Hits carrying a `site_common` record point at shared per-site files. The
//! `metadata_file` entry holds the site's navigation links, which are copied
//! onto the hit together with absolute `related_pages` URLs. Contexts are
//! loaded once per site and cached.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::rag::core::candidate::{Metadata, SearchHit};
use crate::rag::enrichment::enricher::ResultEnricher;

/// Shared context of one crawled site.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteContext {
    /// Navigation links, as `{href, text}` objects.
    pub navigation_links: Vec<Value>,
    /// Parsed site metadata file, if it could be read.
    pub site_metadata: Option<Metadata>,
    /// Whether the referenced header file exists.
    pub has_header: bool,
    /// Whether the referenced footer file exists.
    pub has_footer: bool,
    /// Whether the referenced sidebar file exists.
    pub has_sidebar: bool,
}

/// Enricher backed by a crawler output directory.
pub struct SiteContextEnricher {
    base_dir: PathBuf,
    cache: DashMap<String, Arc<SiteContext>>,
}

impl SiteContextEnricher {
    /// Enricher resolving `site_common` paths against `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: DashMap::new(),
        }
    }

    /// Number of cached site contexts.
    #[must_use]
    pub fn cached_sites(&self) -> usize {
        self.cache.len()
    }

    /// Context for the site a hit belongs to, or `None` without `site_common`.
    #[must_use]
    pub fn site_context(&self, metadata: &Metadata) -> Option<Arc<SiteContext>> {
        let site_common = metadata.get("site_common")?.as_object()?;
        let site_key = site_key(site_common, metadata)?;
        if let Some(cached) = self.cache.get(&site_key) {
            return Some(Arc::clone(cached.value()));
        }

        let context = Arc::new(self.load(site_common));
        self.cache.insert(site_key, Arc::clone(&context));
        Some(context)
    }

    fn load(&self, site_common: &Map<String, Value>) -> SiteContext {
        let file_exists = |key: &str| {
            site_common
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|relative| self.base_dir.join(relative).is_file())
        };
        let mut context = SiteContext {
            has_header: file_exists("header_file"),
            has_footer: file_exists("footer_file"),
            has_sidebar: file_exists("sidebar_file"),
            ..SiteContext::default()
        };

        let Some(relative) = site_common.get("metadata_file").and_then(Value::as_str) else {
            return context;
        };
        match read_site_metadata(&self.base_dir.join(relative)) {
            Ok(site_metadata) => {
                context.navigation_links = site_metadata
                    .get("navigation_links")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                context.site_metadata = Some(site_metadata);
            }
            Err(err) => {
                debug!(file = relative, error = %err, "failed to load site metadata");
            }
        }
        context
    }

    fn enrich_hit(&self, hit: &mut SearchHit) -> bool {
        let Some(context) = self.site_context(&hit.metadata) else {
            return false;
        };

        hit.metadata.insert(
            "site_context".to_string(),
            json!({
                "navigation_links": context.navigation_links,
                "site_metadata": context.site_metadata.clone().unwrap_or_default(),
                "has_header": context.has_header,
                "has_footer": context.has_footer,
                "has_sidebar": context.has_sidebar,
            }),
        );
        if context.navigation_links.is_empty() {
            return false;
        }

        hit.metadata.insert(
            "navigation_links".to_string(),
            Value::Array(context.navigation_links.clone()),
        );
        let related = related_pages(&hit.metadata, &context.navigation_links);
        if !related.is_empty() {
            hit.metadata.insert("related_pages".to_string(), json!(related));
        }
        true
    }
}

impl ResultEnricher for SiteContextEnricher {
    fn name(&self) -> &'static str {
        "site_context"
    }

    fn enrich(&self, mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut enriched = 0_usize;
        for hit in &mut hits {
            if self.enrich_hit(hit) {
                enriched += 1;
            }
        }
        if enriched > 0 {
            debug!(enriched, total = hits.len(), "results enriched with site context");
        }
        hits
    }
}

fn read_site_metadata(path: &Path) -> Result<Metadata, String> {
    let raw = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&raw).map_err(|err| err.to_string())
}

/// Cache key: header file name without its trailing `_part`, else the URL
/// host with dots replaced by underscores.
fn site_key(site_common: &Map<String, Value>, metadata: &Metadata) -> Option<String> {
    if let Some(header) = site_common.get("header_file").and_then(Value::as_str)
        && let Some((_, file_name)) = header.rsplit_once('/')
    {
        let prefix = file_name.rsplit_once('_').map_or(file_name, |(head, _)| head);
        return Some(prefix.to_string());
    }

    let url = metadata.get("url").and_then(Value::as_str)?;
    let host = Url::parse(url).ok()?.host_str()?.replace('.', "_");
    Some(host)
}

/// Navigation hrefs resolved against the origin of the hit's `url`.
fn related_pages(metadata: &Metadata, links: &[Value]) -> Vec<String> {
    let Some(origin) = metadata
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| Url::parse(url).ok())
        .and_then(|url| Url::parse(&url.origin().ascii_serialization()).ok())
    else {
        return Vec::new();
    };

    links
        .iter()
        .filter_map(|link| link.get("href").and_then(Value::as_str))
        .filter(|href| !href.is_empty())
        .filter_map(|href| origin.join(href).ok())
        .map(String::from)
        .collect()
}
