//! Category store: sharded JSON content files plus the category registry.
//!
//! The store is the source of truth for everything the pipeline publishes.
//! Content is sharded by category so that runtime consumers never have to
//! load the whole corpus at once:
//!
//! ```text
//! data/
//! ├── categories.json              # registry: id, display name, description
//! ├── glossary/
//! │   ├── data-warehousing.json    # array of GlossaryTerm
//! │   └── etl-elt.json
//! ├── comparisons/
//! │   └── data-orchestration.json  # array of Comparison
//! ├── articles.json                # synced article index (see articles module)
//! └── search-index.json            # derived (see index module)
//! ```
//!
//! ## Naming Convention
//!
//! Category file names are the normalized form of the category display name:
//! lowercase, whitespace to dashes, everything outside `[a-z0-9-]` removed.
//! [`normalize_category_id`] is the single owner of that rule — every
//! component that must agree on filenames goes through it.
//!
//! ## Validation
//!
//! [`validate_store`] enforces the store invariants and fails loudly on the
//! first violation (a corrupt store silently breaks every page lookup
//! downstream):
//! - every category file parses
//! - slugs are unique per kind across all category files
//! - every item references a category id present in the registry
//!
//! A category cannot be removed from the registry while items still reference
//! it; validation rejects the dangling reference rather than re-bucketing
//! members.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Category registry not found: {0}")]
    MissingRegistry(PathBuf),
    #[error("Duplicate {kind} slug '{slug}' (in {first} and {second})")]
    DuplicateSlug {
        kind: ContentKind,
        slug: String,
        first: String,
        second: String,
    },
    #[error("{kind} item '{slug}' references unknown category '{category}'")]
    UnknownCategory {
        kind: ContentKind,
        slug: String,
        category: String,
    },
}

/// The two kinds of programmatic content the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Glossary,
    Comparison,
}

impl ContentKind {
    /// Directory name under the data root holding this kind's shards.
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Glossary => "glossary",
            ContentKind::Comparison => "comparisons",
        }
    }

    /// URL path prefix for published pages of this kind.
    pub fn url_prefix(self) -> &'static str {
        match self {
            ContentKind::Glossary => "glossary",
            ContentKind::Comparison => "compare",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Glossary => write!(f, "glossary"),
            ContentKind::Comparison => write!(f, "comparison"),
        }
    }
}

/// One entry in the category registry (`categories.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A question/answer pair attached to a content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// An authoritative external source cited from a glossary page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    pub title: String,
    pub url: String,
}

/// A glossary term: one published page under `/glossary/<slug>`.
///
/// The JSON field names are camelCase because the data files are shared with
/// the upstream content tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term: String,
    pub slug: String,
    pub category: String,
    #[serde(default)]
    pub short_definition: String,
    /// Long-form body in markdown.
    #[serde(default)]
    pub full_definition: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    /// Slugs of related terms, used for cross-linking.
    #[serde(default)]
    pub related_terms: Vec<String>,
    #[serde(default)]
    pub related_tools: Vec<String>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// `YYYY-MM-DD` freshness signal. Optional; pages without it carry no
    /// dates at all (rendering must stay deterministic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// One row of a comparison's feature table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRow {
    pub feature: String,
    #[serde(default)]
    pub tool_a_value: String,
    #[serde(default)]
    pub tool_b_value: String,
    #[serde(default)]
    pub winner: Option<String>,
}

/// Pro/con lists keyed by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideLists {
    #[serde(default)]
    pub tool_a: Vec<String>,
    #[serde(default)]
    pub tool_b: Vec<String>,
}

/// A tool comparison: one published page under `/compare/<slug>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub slug: String,
    pub tool_a: String,
    pub tool_b: String,
    pub category: String,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub short_verdict: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub features: Vec<FeatureRow>,
    #[serde(default)]
    pub pros: SideLists,
    #[serde(default)]
    pub cons: SideLists,
    #[serde(default)]
    pub final_verdict: String,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Comparison {
    /// Display title: `"Apache Airflow vs Prefect"`.
    pub fn title(&self) -> String {
        format!("{} vs {}", self.tool_a, self.tool_b)
    }
}

/// Shared view over the two item kinds, used by the validator and the
/// sitemap builder where only the common fields matter.
pub trait ContentItem {
    fn slug(&self) -> &str;
    fn title(&self) -> String;
    fn category(&self) -> &str;
    fn body(&self) -> &str;
    fn faqs(&self) -> &[Faq];
    fn last_updated(&self) -> Option<&str>;
}

impl ContentItem for GlossaryTerm {
    fn slug(&self) -> &str {
        &self.slug
    }
    fn title(&self) -> String {
        self.term.clone()
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn body(&self) -> &str {
        &self.full_definition
    }
    fn faqs(&self) -> &[Faq] {
        &self.faqs
    }
    fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }
}

impl ContentItem for Comparison {
    fn slug(&self) -> &str {
        &self.slug
    }
    fn title(&self) -> String {
        Comparison::title(self)
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn body(&self) -> &str {
        &self.final_verdict
    }
    fn faqs(&self) -> &[Faq] {
        &self.faqs
    }
    fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }
}

/// Normalize a category display name to its file/registry id.
///
/// `"Data Warehousing"` → `"data-warehousing"`. This is the one place the
/// rule lives; the loader, the migration tooling, and the index builder all
/// agree on filenames by calling it.
pub fn normalize_category_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        if ch.is_whitespace() {
            id.push('-');
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            id.push(ch);
        }
        // everything else is dropped
    }
    id
}

/// Handle to a data directory following the store layout.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    root: PathBuf,
}

impl CategoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: ContentKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Path of one category shard.
    pub fn category_file(&self, kind: ContentKind, category_id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{category_id}.json"))
    }

    /// Load the category registry. Missing registry is a hard error — the
    /// pipeline cannot name or validate anything without it.
    pub fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let path = self.root.join("categories.json");
        if !path.exists() {
            return Err(StoreError::MissingRegistry(path));
        }
        read_json(&path)
    }

    /// Load every glossary shard, keyed by category file stem, in stable
    /// (sorted) order.
    pub fn load_glossary(&self) -> Result<BTreeMap<String, Vec<GlossaryTerm>>, StoreError> {
        self.load_kind(ContentKind::Glossary)
    }

    /// Load every comparison shard, keyed by category file stem.
    pub fn load_comparisons(&self) -> Result<BTreeMap<String, Vec<Comparison>>, StoreError> {
        self.load_kind(ContentKind::Comparison)
    }

    /// Load a single glossary shard by category id.
    pub fn load_glossary_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<GlossaryTerm>, StoreError> {
        read_json(&self.category_file(ContentKind::Glossary, category_id))
    }

    /// Load a single comparison shard by category id.
    pub fn load_comparison_category(
        &self,
        category_id: &str,
    ) -> Result<Vec<Comparison>, StoreError> {
        read_json(&self.category_file(ContentKind::Comparison, category_id))
    }

    fn load_kind<T: for<'de> Deserialize<'de>>(
        &self,
        kind: ContentKind,
    ) -> Result<BTreeMap<String, Vec<T>>, StoreError> {
        let dir = self.kind_dir(kind);
        let mut shards = BTreeMap::new();
        if !dir.exists() {
            // An absent kind is an empty kind, not an error: a site may
            // publish only glossary terms.
            return Ok(shards);
        }
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let items: Vec<T> = read_json(&path)?;
            shards.insert(stem, items);
        }
        Ok(shards)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate the store invariants: slug uniqueness per kind and category
/// references. Returns the first violation (fail-fast).
pub fn validate_store(store: &CategoryStore) -> Result<(), StoreError> {
    let categories = store.categories()?;
    let known: HashMap<&str, ()> = categories.iter().map(|c| (c.id.as_str(), ())).collect();

    let glossary = store.load_glossary()?;
    check_kind(ContentKind::Glossary, &glossary, &known, |t: &GlossaryTerm| {
        (&t.slug, &t.category)
    })?;

    let comparisons = store.load_comparisons()?;
    check_kind(ContentKind::Comparison, &comparisons, &known, |c: &Comparison| {
        (&c.slug, &c.category)
    })?;

    Ok(())
}

fn check_kind<T>(
    kind: ContentKind,
    shards: &BTreeMap<String, Vec<T>>,
    known: &HashMap<&str, ()>,
    fields: impl Fn(&T) -> (&String, &String),
) -> Result<(), StoreError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for (shard, items) in shards {
        for item in items {
            let (slug, category) = fields(item);
            if let Some(first) = seen.get(slug.as_str()) {
                return Err(StoreError::DuplicateSlug {
                    kind,
                    slug: slug.clone(),
                    first: first.clone(),
                    second: shard.clone(),
                });
            }
            seen.insert(slug.clone(), shard.clone());
            if !known.contains_key(category.as_str()) {
                return Err(StoreError::UnknownCategory {
                    kind,
                    slug: slug.clone(),
                    category: category.clone(),
                });
            }
        }
    }
    Ok(())
}
