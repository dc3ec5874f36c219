//! Article index sync from the content source API.
//!
//! Articles live in an external CMS and are the hubs of the internal-link
//! graph. This module pulls the published article list over the CMS's
//! paginated REST API and distills it into `data/articles.json`:
//! one record per article with the keywords the link injector matches on
//! (cleaned title, tag names, category names), plus the category and tag
//! slugs the sitemap builder needs.
//!
//! ## Pagination contract
//!
//! The API returns 100 items per page; requesting a page past the end
//! answers HTTP 400, which terminates pagination — it is the "no more
//! pages" signal, not an error. Pages are fetched one at a time with a
//! small politeness delay; each request carries an explicit timeout and is
//! retried up to three times with linear backoff before the sync is
//! declared failed.
//!
//! ## Failure fallback
//!
//! A successful sync also snapshots the result to `.articles-cache.json`.
//! When the API is unreachable, the sync restores `articles.json` from that
//! snapshot (with a warning) so a full site build can still run offline.
//! Only "no data and no snapshot" fails the command.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, SiteConfig};

/// Snapshot of the last successful sync, used as an offline fallback.
pub const ARTICLES_CACHE_FILE: &str = ".articles-cache.json";

/// Article index artifact within the data directory.
pub const ARTICLES_FILENAME: &str = "articles.json";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content API request failed after retries: {0}")]
    Upstream(String),
    #[error("Content API unavailable and no cached article index exists")]
    NoData,
}

/// One article record consumed by the link injector and sitemap builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// `YYYY-MM-DD` last-modified date, when the API provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

/// A category or tag slug with its display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    pub slug: String,
    pub name: String,
}

/// The synced article index (`data/articles.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleIndex {
    #[serde(default)]
    pub synced_at: String,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub categories: Vec<TaxonomyTerm>,
    #[serde(default)]
    pub tags: Vec<TaxonomyTerm>,
}

impl ArticleIndex {
    pub fn load(data_dir: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(data_dir.join(ARTICLES_FILENAME))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load if present; an absent index is an empty one (pages simply get
    /// no article links).
    pub fn load_or_empty(data_dir: &Path) -> Self {
        Self::load(data_dir).unwrap_or_default()
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), SyncError> {
        fs::create_dir_all(data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(data_dir.join(ARTICLES_FILENAME), json)?;
        Ok(())
    }
}

// ============================================================================
// Wire types (content source API)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

/// A post as returned by the content API (only the fields we request).
#[derive(Debug, Clone, Deserialize)]
pub struct SourcePost {
    pub slug: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTaxonomy {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub count: u64,
}

// ============================================================================
// Fetching
// ============================================================================

fn http_client(config: &SiteConfig) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.source.request_timeout_secs))
        .user_agent(concat!("longtail/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::Upstream(e.to_string()))
}

/// Fetch every post page by page. `fields` is the `_fields` filter — the
/// sync and the LLM sitemap request different column sets.
pub async fn fetch_all_posts(
    config: &SiteConfig,
    fields: &str,
) -> Result<Vec<SourcePost>, SyncError> {
    let api = config.require_api_url()?;
    let client = http_client(config)?;
    let mut posts = Vec::new();
    let mut page: u32 = 1;

    while page <= config.source.max_pages {
        let url = format!(
            "{api}/posts?per_page={}&page={page}&_fields={fields}",
            config.source.page_size
        );
        match fetch_page(&client, &url).await? {
            Some(batch) if !batch.is_empty() => {
                println!("   Page {page}: {} posts", batch.len());
                posts.extend(batch);
                page += 1;
            }
            // Empty page or HTTP 400: end of pagination.
            _ => break,
        }
        tokio::time::sleep(Duration::from_millis(config.source.page_delay_ms)).await;
    }

    Ok(posts)
}

/// Fetch one page with retries. `Ok(None)` means HTTP 400 — end of data.
async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<Vec<SourcePost>>, SyncError> {
    const ATTEMPTS: u32 = 3;
    let mut last_error = String::new();

    for attempt in 1..=ATTEMPTS {
        match client.get(url).send().await {
            Ok(response) => {
                if response.status().as_u16() == 400 {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    last_error = format!("HTTP {}", response.status());
                } else {
                    match response.json::<Vec<SourcePost>>().await {
                        Ok(batch) => return Ok(Some(batch)),
                        Err(e) => last_error = e.to_string(),
                    }
                }
            }
            Err(e) => last_error = e.to_string(),
        }
        if attempt < ATTEMPTS {
            eprintln!("Warning: fetch failed (attempt {attempt}/{ATTEMPTS}) for {url}: {last_error}");
            tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
        }
    }

    Err(SyncError::Upstream(format!("{url}: {last_error}")))
}

/// Fetch one taxonomy endpoint (`categories` or `tags`), keeping only terms
/// with published posts.
pub(crate) async fn fetch_taxonomy(
    config: &SiteConfig,
    endpoint: &str,
) -> Result<Vec<SourceTaxonomy>, SyncError> {
    let api = config.require_api_url()?;
    let client = http_client(config)?;
    let url = format!("{api}/{endpoint}?per_page=100&_fields=id,name,slug,count");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| SyncError::Upstream(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(SyncError::Upstream(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }
    let terms: Vec<SourceTaxonomy> = response
        .json()
        .await
        .map_err(|e| SyncError::Upstream(format!("{url}: {e}")))?;
    Ok(terms.into_iter().filter(|t| t.count > 0).collect())
}

// ============================================================================
// Distillation
// ============================================================================

/// Decode the HTML entities the content API habitually leaves in titles,
/// and strip any markup.
pub fn clean_title(raw: &str) -> String {
    let decoded = raw
        .replace("&amp;", "&")
        .replace("&#038;", "&")
        .replace("&#8211;", "-")
        .replace("&#8217;", "'")
        .replace("&#8220;", "\"")
        .replace("&#8221;", "\"");
    crate::validate::strip_markup(&decoded)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive link-injection keywords for one post: cleaned title (when short
/// enough to plausibly occur in body text), then tag names, then category
/// names. Order is priority order; duplicates are dropped.
pub fn extract_keywords(
    post: &SourcePost,
    categories: &HashMap<u64, SourceTaxonomy>,
    tags: &HashMap<u64, SourceTaxonomy>,
) -> Vec<String> {
    let mut keywords = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut push = |kw: String| {
        let key = kw.to_ascii_lowercase();
        if !kw.is_empty() && seen.insert(key) {
            keywords.push(kw);
        }
    };

    let title = clean_title(&post.title.rendered);
    if !title.is_empty() && title.len() < 60 {
        push(title);
    }
    for id in &post.tags {
        if let Some(tag) = tags.get(id) {
            push(clean_title(&tag.name));
        }
    }
    for id in &post.categories {
        if let Some(cat) = categories.get(id) {
            push(clean_title(&cat.name));
        }
    }
    keywords
}

fn date_only(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.split('T').next().unwrap_or(v).to_string())
}

/// Run a full sync: fetch posts and taxonomies, distill the article index,
/// write it plus the fallback snapshot. On upstream failure, restore from
/// the snapshot instead.
pub async fn sync(config: &SiteConfig) -> Result<ArticleIndex, SyncError> {
    let data_dir = Path::new(&config.data_dir);

    let fetched = fetch_everything(config).await;
    let index = match fetched {
        Ok(index) => index,
        Err(e @ SyncError::Config(_)) => return Err(e),
        Err(e) => {
            eprintln!("Warning: content API sync failed ({e}); falling back to cached index");
            return restore_from_snapshot(data_dir);
        }
    };

    index.save(data_dir)?;
    fs::write(ARTICLES_CACHE_FILE, serde_json::to_string_pretty(&index)?)?;
    Ok(index)
}

async fn fetch_everything(config: &SiteConfig) -> Result<ArticleIndex, SyncError> {
    let posts = fetch_all_posts(config, "id,slug,title,categories,tags,modified").await?;
    let categories: HashMap<u64, SourceTaxonomy> = fetch_taxonomy(config, "categories")
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    let tags: HashMap<u64, SourceTaxonomy> = fetch_taxonomy(config, "tags")
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let articles = posts
        .iter()
        .map(|post| Article {
            slug: post.slug.clone(),
            title: clean_title(&post.title.rendered),
            keywords: extract_keywords(post, &categories, &tags),
            categories: post
                .categories
                .iter()
                .filter_map(|id| categories.get(id).map(|c| c.slug.clone()))
                .collect(),
            modified: date_only(&post.modified),
        })
        .collect();

    let mut category_terms: Vec<TaxonomyTerm> = categories
        .values()
        .map(|t| TaxonomyTerm {
            slug: t.slug.clone(),
            name: t.name.clone(),
        })
        .collect();
    category_terms.sort_by(|a, b| a.slug.cmp(&b.slug));

    let mut tag_terms: Vec<TaxonomyTerm> = tags
        .values()
        .map(|t| TaxonomyTerm {
            slug: t.slug.clone(),
            name: t.name.clone(),
        })
        .collect();
    tag_terms.sort_by(|a, b| a.slug.cmp(&b.slug));

    Ok(ArticleIndex {
        synced_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        articles,
        categories: category_terms,
        tags: tag_terms,
    })
}

/// Restore `articles.json` from the last successful sync's snapshot.
pub fn restore_from_snapshot(data_dir: &Path) -> Result<ArticleIndex, SyncError> {
    let snapshot = Path::new(ARTICLES_CACHE_FILE);
    if !snapshot.exists() {
        return Err(SyncError::NoData);
    }
    let content = fs::read_to_string(snapshot)?;
    let index: ArticleIndex = serde_json::from_str(&content)?;
    index.save(data_dir)?;
    Ok(index)
}
