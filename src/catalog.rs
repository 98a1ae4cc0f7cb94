//! Problem catalog used to resolve a problem title by ordinal number.
//!
//! The catalog is a JSON array of `{number, title}` pairs, read from a local
//! file or fetched once from a configured URL. Loading is blocking and
//! happens at most once per process; a failed load is logged and retried on
//! the next request instead of being memoized.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ProblemEntry {
    pub number: i64,
    pub title: String,
}

/// Immutable number → title mapping.
#[derive(Debug, Default)]
pub struct ProblemCatalog {
    titles: HashMap<i64, String>,
}

impl ProblemCatalog {
    pub fn from_entries(entries: Vec<ProblemEntry>) -> Self {
        let titles = entries
            .into_iter()
            .map(|entry| (entry.number, entry.title))
            .collect();
        Self { titles }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading problem set {}", path.display()))?;
        let entries: Vec<ProblemEntry> =
            serde_json::from_str(&raw).context("parsing problem set JSON")?;
        Ok(Self::from_entries(entries))
    }

    pub fn fetch(url: &str) -> Result<Self> {
        let entries: Vec<ProblemEntry> = ureq::get(url)
            .call()
            .with_context(|| format!("fetching problem set from {url}"))?
            .into_json()
            .context("parsing fetched problem set JSON")?;
        Ok(Self::from_entries(entries))
    }

    pub fn title(&self, number: i64) -> Option<&str> {
        self.titles.get(&number).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// The search keyword sent to the video provider for one problem number.
pub fn search_query(number: i64) -> String {
    format!("leetcode {number}")
}

#[derive(Debug, Clone)]
pub enum CatalogSource {
    File(PathBuf),
    Remote(String),
    Disabled,
}

/// Lazily loaded, shared catalog handle. Safe to call from many requests;
/// only the first successful load hits the disk or the network.
pub struct CatalogHandle {
    source: CatalogSource,
    current: RwLock<Option<Arc<ProblemCatalog>>>,
}

impl CatalogHandle {
    pub fn new(source: CatalogSource) -> Self {
        Self {
            source,
            current: RwLock::new(None),
        }
    }

    /// A configured file wins over a URL; neither disables title lookups.
    pub fn from_config(file: Option<PathBuf>, url: Option<String>) -> Self {
        let source = match (file, url) {
            (Some(path), _) => CatalogSource::File(path),
            (None, Some(url)) => CatalogSource::Remote(url),
            (None, None) => CatalogSource::Disabled,
        };
        Self::new(source)
    }

    /// Returns the memoized catalog, loading it on first use. Load failures
    /// degrade to an empty catalog so search pages still render.
    pub fn get_or_load(&self) -> Arc<ProblemCatalog> {
        if let Some(catalog) = self.current.read().clone() {
            return catalog;
        }

        match self.load() {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                *self.current.write() = Some(catalog.clone());
                catalog
            }
            Err(err) => {
                warn!("problem catalog unavailable: {err:#}");
                Arc::new(ProblemCatalog::default())
            }
        }
    }

    fn load(&self) -> Result<ProblemCatalog> {
        match &self.source {
            CatalogSource::File(path) => ProblemCatalog::load_file(path),
            CatalogSource::Remote(url) => ProblemCatalog::fetch(url),
            CatalogSource::Disabled => Ok(ProblemCatalog::default()),
        }
    }
}
