//! Site configuration module.
//!
//! Handles loading and validating `config.toml`. Configuration is a single
//! file at the project root; all fields have working defaults, so a config
//! file only needs the values it overrides. Unknown keys are rejected to
//! catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_url = "https://example.com"   # Public site origin (no trailing slash)
//! data_dir = "data"                  # Category store root
//! output_dir = "dist"                # Build output root
//! public_dir = "public"              # Locally served files (IndexNow key)
//!
//! [source]
//! api_url = ""                       # Content source REST API base
//! page_size = 100                    # Items per pagination request
//! request_timeout_secs = 15          # Per-request timeout
//! page_delay_ms = 100                # Politeness delay between pages
//! max_pages = 100                    # Pagination safety cap
//!
//! [storage]
//! bucket = ""                        # Object storage bucket (or R2_BUCKET_NAME)
//! page_cache_secs = 86400            # Cache-Control max-age for pages
//!
//! [router]
//! bind = "127.0.0.1:8788"            # Edge router listen address
//! origin_url = ""                    # Origin server for pass-through traffic
//! ```
//!
//! Secrets never live in the config file. Object-storage credentials are
//! read from the environment (`R2_ENDPOINT`, `R2_ACCESS_KEY_ID`,
//! `R2_SECRET_ACCESS_KEY`, optionally `R2_BUCKET_NAME`), with `.env`
//! support via dotenvy.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Public origin of the site, e.g. `https://example.com`. Required for
    /// building sitemaps, canonical URLs, and notifications.
    pub site_url: String,
    /// Display name appended to page titles and Open Graph tags. Optional.
    pub site_name: String,
    /// Category store root directory.
    pub data_dir: String,
    /// Build output directory (what `deploy` uploads).
    pub output_dir: String,
    /// Directory of files served from the site root by the origin host
    /// (IndexNow key files land here).
    pub public_dir: String,
    /// Content source API settings.
    pub source: SourceConfig,
    /// Object storage settings.
    pub storage: StorageConfig,
    /// Edge router settings.
    pub router: RouterConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            site_name: String::new(),
            data_dir: "data".to_string(),
            output_dir: "dist".to_string(),
            public_dir: "public".to_string(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

/// Content source (REST API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URL of the content API, e.g. `https://app.example.com/wp-json/wp/v2`.
    pub api_url: String,
    /// Items per pagination request (API maximum is 100).
    pub page_size: u32,
    /// Timeout applied to every request.
    pub request_timeout_secs: u64,
    /// Fixed delay between pagination requests. Politeness toward the
    /// upstream API, not a correctness mechanism.
    pub page_delay_ms: u64,
    /// Hard cap on pages fetched, as an infinite-loop guard.
    pub max_pages: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            page_size: 100,
            request_timeout_secs: 15,
            page_delay_ms: 100,
            max_pages: 100,
        }
    }
}

/// Object storage settings (credentials come from the environment).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket name. Falls back to the `R2_BUCKET_NAME` environment variable.
    pub bucket: String,
    /// `Cache-Control: max-age` for uploaded pages. Sitemaps always get
    /// `max-age=0, must-revalidate` so crawlers see updates immediately.
    pub page_cache_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            page_cache_secs: 86_400,
        }
    }
}

/// Edge router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Listen address.
    pub bind: String,
    /// Origin server receiving all non-pSEO traffic, e.g. `https://app.example.com`.
    pub origin_url: String,
    /// `Cache-Control: max-age` on storage-served pages.
    pub cache_max_age_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8788".to_string(),
            origin_url: String::new(),
            cache_max_age_secs: 86_400,
        }
    }
}

impl SiteConfig {
    /// Load and validate a config file. A missing file yields the defaults
    /// (which then fail validation for commands that need a site URL).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges. Does not require a site URL — commands that
    /// need one call [`SiteConfig::require_site_url`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.site_url.is_empty() {
            if !self.site_url.starts_with("http") {
                return Err(ConfigError::Validation(format!(
                    "site_url must be absolute (starts with http), got '{}'",
                    self.site_url
                )));
            }
            if self.site_url.ends_with('/') {
                return Err(ConfigError::Validation(
                    "site_url must not end with a slash".to_string(),
                ));
            }
        }
        if self.source.page_size == 0 || self.source.page_size > 100 {
            return Err(ConfigError::Validation(format!(
                "source.page_size must be in 1..=100, got {}",
                self.source.page_size
            )));
        }
        if self.source.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "source.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.source.max_pages == 0 {
            return Err(ConfigError::Validation(
                "source.max_pages must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The site URL, or a configuration error when it is unset. Never
    /// proceeds with a default that would corrupt every generated URL.
    pub fn require_site_url(&self) -> Result<&str, ConfigError> {
        if self.site_url.is_empty() {
            return Err(ConfigError::Validation(
                "site_url is not set — add it to config.toml".to_string(),
            ));
        }
        Ok(&self.site_url)
    }

    /// The content API base URL, or a configuration error when unset.
    pub fn require_api_url(&self) -> Result<&str, ConfigError> {
        if self.source.api_url.is_empty() {
            return Err(ConfigError::Validation(
                "source.api_url is not set — add it to config.toml".to_string(),
            ));
        }
        Ok(&self.source.api_url)
    }

    /// Hostname portion of the site URL (for IndexNow payloads).
    pub fn site_host(&self) -> Result<String, ConfigError> {
        let url = self.require_site_url()?;
        let host = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if host.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site_url '{url}' has no host"
            )));
        }
        Ok(host)
    }
}

/// A documented stock `config.toml` with all options and their defaults.
pub fn stock_config_toml() -> &'static str {
    r#"# longtail configuration
# All options are optional - defaults shown below.

# Public site origin. Required for builds, deploys, and notifications.
# No trailing slash.
site_url = "https://example.com"

# Display name appended to page titles and Open Graph tags.
site_name = ""

# Category store root (categories.json + glossary/ + comparisons/).
data_dir = "data"

# Build output directory; everything under it is deployed verbatim.
output_dir = "dist"

# Files the origin host serves from the site root (IndexNow key files).
public_dir = "public"

[source]
# Content source REST API base, e.g. "https://app.example.com/wp-json/wp/v2".
api_url = ""
# Items per pagination request (API maximum is 100).
page_size = 100
# Per-request timeout in seconds.
request_timeout_secs = 15
# Politeness delay between pagination requests, in milliseconds.
page_delay_ms = 100
# Pagination safety cap.
max_pages = 100

[storage]
# Bucket name; the R2_BUCKET_NAME environment variable overrides it.
# Credentials come from R2_ENDPOINT, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY.
bucket = ""
# Cache-Control max-age for uploaded pages (sitemaps are never cached).
page_cache_secs = 86400

[router]
# Edge router listen address.
bind = "127.0.0.1:8788"
# Origin server for all non-pSEO traffic.
origin_url = ""
# Cache-Control max-age for storage-served pages.
cache_max_age_secs = 86400
"#
}
