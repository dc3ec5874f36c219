//! Push-indexing notifier (IndexNow).
//!
//! Rather than waiting for crawl discovery, changed URLs are pushed to the
//! IndexNow API, which fans out to the participating search engines. The
//! flow is deliberately defensive — a bad submission wastes the site's
//! standing with the endpoint:
//!
//! 1. verify the live sitemap index is reachable and well-formed, and
//!    harvest every `<loc>` it (and its child sitemaps) declares;
//! 2. verify the site actually serves the key verification file
//!    (`{site}/{key}.txt`) before claiming ownership of the host;
//! 3. submit either all URLs (`--force`/`--all`) or only URLs never
//!    notified before, capped at the documented per-request maximum;
//! 4. persist the notified set and timestamp **only after** a 2xx response,
//!    so a failed run reprocesses the same candidate set.
//!
//! Unforced runs are rate-limited to one per 24 hours. The cache backing
//! the window is advisory: losing it merely permits an earlier-than-ideal
//! re-notification.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, SiteConfig};
use crate::storage::extract_tag_values;

/// Notifier cache at the project root.
pub const NOTIFICATION_CACHE_FILE: &str = ".notification-cache.json";

/// IndexNow's documented per-request URL cap.
pub const MAX_URLS_PER_SUBMISSION: usize = 10_000;

/// Minimum gap between unforced notification runs.
const RATE_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Submission endpoints, tried in order until one accepts.
const ENDPOINTS: &[(&str, &str)] = &[
    ("IndexNow", "https://api.indexnow.org/indexnow"),
    ("Bing", "https://www.bing.com/indexnow"),
    ("Yandex", "https://yandex.com/indexnow"),
];

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Sitemap verification failed: {0}")]
    SitemapInvalid(String),
    #[error("IndexNow key verification failed: {0}")]
    KeyVerification(String),
    #[error("All IndexNow endpoints rejected the submission: {0}")]
    SubmissionFailed(String),
}

/// Timestamp and URL set of past notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCache {
    #[serde(default)]
    pub last_notified: i64,
    #[serde(default)]
    pub notified_urls: Vec<String>,
}

impl NotificationCache {
    /// Tolerant load: a missing or corrupt cache is an empty one.
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<(), NotifyError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Why a run submitted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RateLimit,
    NoNewUrls,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RateLimit => write!(f, "rate_limit"),
            SkipReason::NoNewUrls => write!(f, "no_new_urls"),
        }
    }
}

/// Outcome of a notifier run.
#[derive(Debug)]
pub enum NotifyOutcome {
    Submitted { notified: usize, total: usize },
    Skipped(SkipReason),
}

/// What a run decided to do.
#[derive(Debug, PartialEq)]
pub enum NotificationPlan {
    Skip(SkipReason),
    Submit(Vec<String>),
}

/// Pure decision logic: rate window first, then candidate selection.
///
/// Unforced runs inside the 24-hour window are skipped outright; `force`
/// and `all` both bypass the window (`all` resubmits the full URL set,
/// `force` additionally ignores nothing else — they differ only in intent).
pub fn plan_notification(
    all_urls: &[String],
    cache: &NotificationCache,
    now_secs: i64,
    force: bool,
    all: bool,
) -> NotificationPlan {
    if !force && !all {
        if cache.last_notified > 0 && now_secs - cache.last_notified < RATE_WINDOW_SECS {
            return NotificationPlan::Skip(SkipReason::RateLimit);
        }
        let notified: std::collections::HashSet<&str> =
            cache.notified_urls.iter().map(String::as_str).collect();
        let new_urls: Vec<String> = all_urls
            .iter()
            .filter(|u| !notified.contains(u.as_str()))
            .cloned()
            .collect();
        if new_urls.is_empty() {
            return NotificationPlan::Skip(SkipReason::NoNewUrls);
        }
        return NotificationPlan::Submit(new_urls);
    }

    if all_urls.is_empty() {
        NotificationPlan::Skip(SkipReason::NoNewUrls)
    } else {
        NotificationPlan::Submit(all_urls.to_vec())
    }
}

/// Read the IndexNow key from `public/indexnow-key.txt`, generating one
/// (plus the `<key>.txt` verification file) when absent.
pub fn ensure_key(public_dir: &Path) -> Result<String, NotifyError> {
    let key_file = public_dir.join("indexnow-key.txt");
    if key_file.exists() {
        let key = fs::read_to_string(&key_file)?.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let key = Uuid::new_v4().simple().to_string();
    fs::create_dir_all(public_dir)?;
    fs::write(&key_file, &key)?;
    fs::write(public_dir.join(format!("{key}.txt")), &key)?;
    println!("   Generated IndexNow key — deploy {}/<key>.txt before notifying", public_dir.display());
    Ok(key)
}

/// Parse a fetched sitemap document into the child-sitemap list (for an
/// index) or the URL list (for a urlset).
pub fn parse_sitemap(xml: &str) -> Result<SitemapDoc, NotifyError> {
    if !xml.contains("<?xml") {
        return Err(NotifyError::SitemapInvalid(
            "response is not XML".to_string(),
        ));
    }
    if xml.contains("<sitemapindex") {
        Ok(SitemapDoc::Index(extract_tag_values(xml, "loc")))
    } else if xml.contains("<urlset") {
        Ok(SitemapDoc::Urlset(extract_tag_values(xml, "loc")))
    } else {
        Err(NotifyError::SitemapInvalid(
            "neither <sitemapindex> nor <urlset> found".to_string(),
        ))
    }
}

/// A parsed sitemap document.
#[derive(Debug, PartialEq)]
pub enum SitemapDoc {
    Index(Vec<String>),
    Urlset(Vec<String>),
}

fn http_client(config: &SiteConfig) -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.source.request_timeout_secs))
        .user_agent(concat!("longtail/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NotifyError::SitemapInvalid(e.to_string()))
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, NotifyError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| NotifyError::SitemapInvalid(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(NotifyError::SitemapInvalid(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| NotifyError::SitemapInvalid(format!("{url}: {e}")))
}

/// Harvest every URL the live sitemaps declare. Follows one level of
/// sitemap index; prefers `sitemap-index.xml`, falling back to `sitemap.xml`.
async fn fetch_all_sitemap_urls(
    client: &reqwest::Client,
    site_url: &str,
) -> Result<Vec<String>, NotifyError> {
    let index_url = format!("{site_url}/sitemap-index.xml");
    let xml = match fetch_text(client, &index_url).await {
        Ok(xml) => xml,
        Err(_) => fetch_text(client, &format!("{site_url}/sitemap.xml")).await?,
    };

    match parse_sitemap(&xml)? {
        SitemapDoc::Urlset(urls) => Ok(urls),
        SitemapDoc::Index(children) => {
            let mut urls = Vec::new();
            for child in children {
                let child_xml = fetch_text(client, &child).await?;
                match parse_sitemap(&child_xml)? {
                    SitemapDoc::Urlset(mut child_urls) => urls.append(&mut child_urls),
                    SitemapDoc::Index(_) => {
                        return Err(NotifyError::SitemapInvalid(format!(
                            "nested sitemap index at {child}"
                        )));
                    }
                }
            }
            Ok(urls)
        }
    }
}

/// Verify the site serves the key verification file with matching content.
async fn verify_hosted_key(
    client: &reqwest::Client,
    site_url: &str,
    key: &str,
) -> Result<(), NotifyError> {
    let url = format!("{site_url}/{key}.txt");
    let body = fetch_text(client, &url)
        .await
        .map_err(|e| NotifyError::KeyVerification(format!("{e} — deploy the key file first")))?;
    if body.trim() != key {
        return Err(NotifyError::KeyVerification(format!(
            "{url} content does not match the local key"
        )));
    }
    Ok(())
}

/// Submit one batch to the first endpoint that accepts it.
async fn submit(
    client: &reqwest::Client,
    host: &str,
    key: &str,
    key_location: &str,
    urls: &[String],
) -> Result<(), NotifyError> {
    let batch = &urls[..urls.len().min(MAX_URLS_PER_SUBMISSION)];
    let payload = json!({
        "host": host,
        "key": key,
        "keyLocation": key_location,
        "urlList": batch,
    });

    let mut last_error = String::new();
    for (name, endpoint) in ENDPOINTS {
        println!("   Submitting {} URLs to {name}...", batch.len());
        match client.post(*endpoint).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                println!("   {name}: accepted (HTTP {})", response.status());
                return Ok(());
            }
            Ok(response) => {
                last_error = format!("{name}: HTTP {}", response.status());
                eprintln!("   {last_error}");
            }
            Err(e) => {
                last_error = format!("{name}: {e}");
                eprintln!("   {last_error}");
            }
        }
    }
    Err(NotifyError::SubmissionFailed(last_error))
}

/// Run the notifier end to end. See module docs for the sequence.
pub async fn notify(
    config: &SiteConfig,
    force: bool,
    all: bool,
) -> Result<NotifyOutcome, NotifyError> {
    let site_url = config.require_site_url()?.to_string();
    let host = config.site_host()?;
    let client = http_client(config)?;

    let urls = fetch_all_sitemap_urls(&client, &site_url).await?;
    println!("   Sitemap verified: {} URLs", urls.len());

    let key = ensure_key(Path::new(&config.public_dir))?;
    verify_hosted_key(&client, &site_url, &key).await?;

    let cache_path = Path::new(NOTIFICATION_CACHE_FILE);
    let cache = NotificationCache::load(cache_path);
    let now = chrono::Utc::now().timestamp();

    let candidates = match plan_notification(&urls, &cache, now, force, all) {
        NotificationPlan::Skip(reason) => {
            println!("   Skipped: {reason}");
            return Ok(NotifyOutcome::Skipped(reason));
        }
        NotificationPlan::Submit(candidates) => candidates,
    };

    let key_location = format!("{site_url}/{key}.txt");
    submit(&client, &host, &key, &key_location, &candidates).await?;

    // Only a successful submission mutates the cache.
    let notified_urls = if force || all {
        urls.clone()
    } else {
        let mut merged = cache.notified_urls.clone();
        let seen: std::collections::HashSet<&str> = merged.iter().map(String::as_str).collect();
        let mut fresh: Vec<String> = candidates
            .iter()
            .filter(|u| !seen.contains(u.as_str()))
            .cloned()
            .collect();
        merged.append(&mut fresh);
        merged
    };
    let updated = NotificationCache {
        last_notified: now,
        notified_urls,
    };
    updated.save(cache_path)?;

    Ok(NotifyOutcome::Submitted {
        notified: candidates.len().min(MAX_URLS_PER_SUBMISSION),
        total: urls.len(),
    })
}
