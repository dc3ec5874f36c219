//! Search index and lazy page loading.
//!
//! The full category store can run to hundreds of megabytes; consumers that
//! only need to answer "which category owns this slug?" must never pay for
//! it. The index is a lightweight projection — slug, category, and a short
//! summary per item — regenerated wholesale whenever the store changes. It
//! is derived data: the store stays the source of truth.
//!
//! [`PageLoader`] is the runtime consumer: it resolves a slug through the
//! index, then loads and caches only that category's shard. The cache is an
//! explicit field of the loader instance, not module state, so tests can
//! construct loaders against throwaway stores and observe exactly which
//! shards were touched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::{CategoryStore, Comparison, GlossaryTerm, StoreError};

/// Bump to invalidate stale index files when the format changes.
const INDEX_VERSION: u32 = 1;

/// Filename of the index within the data directory.
pub const INDEX_FILENAME: &str = "search-index.json";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Search index {path} has version {found}, expected {expected} — rebuild with `longtail index`")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// One index entry: just enough to find, list, and search an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub summary: String,
}

/// The derived search index covering both content kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndex {
    pub version: u32,
    pub glossary: Vec<IndexEntry>,
    pub comparisons: Vec<IndexEntry>,
}

impl SearchIndex {
    /// Build the index from the full store. Linear in total item count;
    /// any shard that fails to parse fails the whole build (a corrupt
    /// index would silently break every page lookup downstream).
    pub fn build(store: &CategoryStore) -> Result<Self, IndexError> {
        let mut glossary = Vec::new();
        for terms in store.load_glossary()?.into_values() {
            for term in terms {
                glossary.push(IndexEntry {
                    title: term.term.clone(),
                    slug: term.slug.clone(),
                    category: term.category.clone(),
                    summary: term.short_definition.clone(),
                });
            }
        }
        glossary.sort_by(|a, b| a.title.cmp(&b.title));

        let mut comparisons = Vec::new();
        for shard in store.load_comparisons()?.into_values() {
            for cmp in shard {
                comparisons.push(IndexEntry {
                    title: cmp.title(),
                    slug: cmp.slug.clone(),
                    category: cmp.category.clone(),
                    summary: cmp.short_verdict.clone(),
                });
            }
        }
        comparisons.sort_by(|a, b| a.title.cmp(&b.title));

        Ok(Self {
            version: INDEX_VERSION,
            glossary,
            comparisons,
        })
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(data_dir.join(INDEX_FILENAME), json)?;
        Ok(())
    }

    pub fn load(data_dir: &Path) -> Result<Self, IndexError> {
        let path = data_dir.join(INDEX_FILENAME);
        let content = fs::read_to_string(&path)?;
        let index: Self = serde_json::from_str(&content)?;
        if index.version != INDEX_VERSION {
            return Err(IndexError::VersionMismatch {
                path,
                found: index.version,
                expected: INDEX_VERSION,
            });
        }
        Ok(index)
    }

    fn find(entries: &[IndexEntry], slug: &str) -> Option<IndexEntry> {
        entries.iter().find(|e| e.slug == slug).cloned()
    }
}

/// Lazy, cached access to individual content items by slug.
///
/// Shards are loaded on first touch and held for the lifetime of the loader.
/// A slug absent from the index is a normal outcome — callers get `Ok(None)`
/// and render a 404; only genuine store corruption (a shard named by the
/// index that is missing or unparseable) is an error.
pub struct PageLoader {
    store: CategoryStore,
    index: SearchIndex,
    glossary_cache: HashMap<String, Vec<GlossaryTerm>>,
    comparison_cache: HashMap<String, Vec<Comparison>>,
}

impl PageLoader {
    pub fn new(store: CategoryStore, index: SearchIndex) -> Self {
        Self {
            store,
            index,
            glossary_cache: HashMap::new(),
            comparison_cache: HashMap::new(),
        }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Look up a glossary term, loading only its category shard.
    pub fn glossary_term(&mut self, slug: &str) -> Result<Option<GlossaryTerm>, IndexError> {
        let Some(entry) = SearchIndex::find(&self.index.glossary, slug) else {
            return Ok(None);
        };
        let category_id = crate::store::normalize_category_id(&entry.category);
        if !self.glossary_cache.contains_key(&category_id) {
            let shard = self.store.load_glossary_category(&category_id)?;
            self.glossary_cache.insert(category_id.clone(), shard);
        }
        let shard = &self.glossary_cache[&category_id];
        Ok(shard.iter().find(|t| t.slug == slug).cloned())
    }

    /// Look up a comparison, loading only its category shard.
    pub fn comparison(&mut self, slug: &str) -> Result<Option<Comparison>, IndexError> {
        let Some(entry) = SearchIndex::find(&self.index.comparisons, slug) else {
            return Ok(None);
        };
        let category_id = crate::store::normalize_category_id(&entry.category);
        if !self.comparison_cache.contains_key(&category_id) {
            let shard = self.store.load_comparison_category(&category_id)?;
            self.comparison_cache.insert(category_id.clone(), shard);
        }
        let shard = &self.comparison_cache[&category_id];
        Ok(shard.iter().find(|c| c.slug == slug).cloned())
    }

    /// Number of shards currently held in memory (both kinds).
    pub fn cached_shards(&self) -> usize {
        self.glossary_cache.len() + self.comparison_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::seed_store;
    use tempfile::TempDir;

    // =========================================================================
    // Index building
    // =========================================================================

    #[test]
    fn build_covers_both_kinds_sorted() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        assert_eq!(index.glossary.len(), 3);
        assert_eq!(index.comparisons.len(), 1);
        let titles: Vec<&str> = index.glossary.iter().map(|e| e.title.as_str()).collect();
        let mut sorted = titles.clone();
        sorted.sort();
        assert_eq!(titles, sorted);
    }

    #[test]
    fn entries_carry_slug_category_summary() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        let lake = index
            .glossary
            .iter()
            .find(|e| e.slug == "data-lake")
            .unwrap();
        assert_eq!(lake.category, "data-warehousing");
        assert!(!lake.summary.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        index.save(tmp.path()).unwrap();
        let loaded = SearchIndex::load(tmp.path()).unwrap();
        assert_eq!(loaded.glossary, index.glossary);
    }

    #[test]
    fn version_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "glossary": [], "comparisons": []}}"#,
            INDEX_VERSION + 1
        );
        std::fs::write(tmp.path().join(INDEX_FILENAME), json).unwrap();
        assert!(matches!(
            SearchIndex::load(tmp.path()),
            Err(IndexError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn corrupt_shard_fails_the_build() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        std::fs::write(
            store.category_file(crate::store::ContentKind::Glossary, "data-warehousing"),
            "broken",
        )
        .unwrap();
        assert!(SearchIndex::build(&store).is_err());
    }

    // =========================================================================
    // PageLoader
    // =========================================================================

    #[test]
    fn loader_finds_term_via_single_shard() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        let mut loader = PageLoader::new(store, index);

        let term = loader.glossary_term("data-lake").unwrap().unwrap();
        assert_eq!(term.term, "Data Lake");
        // Only the owning shard was loaded.
        assert_eq!(loader.cached_shards(), 1);
    }

    #[test]
    fn loader_reuses_cached_shard() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        let mut loader = PageLoader::new(store.clone(), index);

        loader.glossary_term("data-lake").unwrap();
        // Corrupt the shard on disk: a cached loader must not notice.
        std::fs::write(
            store.category_file(crate::store::ContentKind::Glossary, "data-warehousing"),
            "broken",
        )
        .unwrap();
        let again = loader.glossary_term("data-warehouse").unwrap();
        assert!(again.is_some());
        assert_eq!(loader.cached_shards(), 1);
    }

    #[test]
    fn missing_slug_is_none_not_error() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        let mut loader = PageLoader::new(store, index);

        assert!(loader.glossary_term("does-not-exist").unwrap().is_none());
        assert!(loader.comparison("does-not-exist").unwrap().is_none());
        // No shard was loaded for a miss.
        assert_eq!(loader.cached_shards(), 0);
    }

    #[test]
    fn loader_resolves_comparisons() {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let index = SearchIndex::build(&store).unwrap();
        let mut loader = PageLoader::new(store, index);

        let cmp = loader.comparison("airflow-vs-prefect").unwrap().unwrap();
        assert_eq!(cmp.tool_a, "Apache Airflow");
    }
}
