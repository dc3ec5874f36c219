//! XML sitemap assembly: validation, chunking, and rendering.
//!
//! Search engines reject an entire sitemap file on the first malformed
//! entry, so assembly is fail-fast: every entry is validated before a single
//! byte is written, and any violation aborts the whole build rather than
//! emitting a partially-invalid file.
//!
//! The sitemap protocol caps a file at 25,000 `<url>` entries. That is a
//! protocol ceiling, not a tunable — when the URL set exceeds it, entries
//! are split into sequential chunks in stable input order and named with an
//! incrementing suffix (`sitemap-pseo-1.xml`, `sitemap-pseo-2.xml`, …). A
//! `sitemap-index.xml` references the main sitemap plus every chunk.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::articles::ArticleIndex;
use crate::store::{Comparison, ContentItem, GlossaryTerm};

/// Hard protocol ceiling on `<url>` entries per sitemap file.
pub const MAX_URLS_PER_FILE: usize = 25_000;

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Invalid sitemap URL '{0}': must be absolute and on the configured site")]
    InvalidLoc(String),
    #[error("Invalid lastmod '{lastmod}' for {loc}: expected YYYY-MM-DD")]
    InvalidLastmod { loc: String, lastmod: String },
    #[error("Invalid priority {priority} for {loc}: must be within [0, 1]")]
    InvalidPriority { loc: String, priority: f32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One `<url>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: f32,
    pub image: Option<String>,
}

impl SitemapEntry {
    pub fn new(loc: String, lastmod: String, changefreq: &'static str, priority: f32) -> Self {
        Self {
            loc,
            lastmod,
            changefreq,
            priority,
            image: None,
        }
    }
}

/// Static origin pages included in the main sitemap.
const STATIC_PAGES: &[(&str, &str, f32)] = &[
    ("/", "daily", 1.0),
    ("/articles", "daily", 0.9),
    ("/about", "monthly", 0.7),
    ("/contact", "monthly", 0.4),
    ("/newsletter", "monthly", 0.5),
    ("/privacy-policy", "yearly", 0.3),
    ("/terms-of-service", "yearly", 0.3),
];

/// Entries for the main sitemap: static pages, articles, category and tag
/// archives.
pub fn collect_main_entries(
    site_url: &str,
    articles: &ArticleIndex,
    today: &str,
) -> Vec<SitemapEntry> {
    let mut entries = Vec::new();

    for (path, changefreq, priority) in STATIC_PAGES {
        entries.push(SitemapEntry::new(
            format!("{site_url}{path}"),
            today.to_string(),
            changefreq,
            *priority,
        ));
    }

    for article in &articles.articles {
        entries.push(SitemapEntry::new(
            format!("{site_url}/articles/{}", article.slug),
            article.modified.clone().unwrap_or_else(|| today.to_string()),
            "weekly",
            0.7,
        ));
    }

    for category in &articles.categories {
        entries.push(SitemapEntry::new(
            format!("{site_url}/category/{}", category.slug),
            today.to_string(),
            "weekly",
            0.7,
        ));
    }

    for tag in &articles.tags {
        entries.push(SitemapEntry::new(
            format!("{site_url}/tag/{}", tag.slug),
            today.to_string(),
            "weekly",
            0.6,
        ));
    }

    entries
}

/// Entries for the pSEO sitemaps: both hub pages plus every glossary term
/// and comparison, in stable store order.
pub fn collect_pseo_entries<'a>(
    site_url: &str,
    glossary: impl Iterator<Item = &'a GlossaryTerm>,
    comparisons: impl Iterator<Item = &'a Comparison>,
    today: &str,
) -> Vec<SitemapEntry> {
    let mut entries = vec![
        SitemapEntry::new(format!("{site_url}/glossary"), today.to_string(), "daily", 0.9),
        SitemapEntry::new(format!("{site_url}/compare"), today.to_string(), "daily", 0.9),
    ];

    for term in glossary {
        entries.push(SitemapEntry::new(
            format!("{site_url}/glossary/{}", term.slug()),
            term.last_updated()
                .map(str::to_string)
                .unwrap_or_else(|| today.to_string()),
            "weekly",
            0.8,
        ));
    }
    for cmp in comparisons {
        entries.push(SitemapEntry::new(
            format!("{site_url}/compare/{}", cmp.slug()),
            cmp.last_updated()
                .map(str::to_string)
                .unwrap_or_else(|| today.to_string()),
            "weekly",
            0.8,
        ));
    }

    entries
}

/// Validate every entry before anything is written. First violation aborts.
pub fn validate_entries(entries: &[SitemapEntry], site_url: &str) -> Result<(), SitemapError> {
    for entry in entries {
        if !entry.loc.starts_with("http") || !entry.loc.starts_with(site_url) {
            return Err(SitemapError::InvalidLoc(entry.loc.clone()));
        }
        if !is_valid_lastmod(&entry.lastmod) {
            return Err(SitemapError::InvalidLastmod {
                loc: entry.loc.clone(),
                lastmod: entry.lastmod.clone(),
            });
        }
        if !(0.0..=1.0).contains(&entry.priority) {
            return Err(SitemapError::InvalidPriority {
                loc: entry.loc.clone(),
                priority: entry.priority,
            });
        }
    }
    Ok(())
}

/// `YYYY-MM-DD` check.
pub fn is_valid_lastmod(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Split entries into ≤25,000-URL chunks in stable input order.
pub fn chunk_entries(entries: &[SitemapEntry]) -> Vec<&[SitemapEntry]> {
    entries.chunks(MAX_URLS_PER_FILE).collect()
}

/// Render one `<urlset>` document.
pub fn render_urlset(entries: &[SitemapEntry]) -> String {
    let mut xml = String::with_capacity(entries.len() * 160 + 256);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\"\n        \
         xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\">\n",
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&entry.loc));
        let _ = writeln!(xml, "    <lastmod>{}</lastmod>", entry.lastmod);
        let _ = writeln!(xml, "    <changefreq>{}</changefreq>", entry.changefreq);
        let _ = writeln!(xml, "    <priority>{:.1}</priority>", entry.priority);
        if let Some(image) = &entry.image {
            xml.push_str("    <image:image>\n");
            let _ = writeln!(xml, "      <image:loc>{}</image:loc>", escape_xml(image));
            xml.push_str("    </image:image>\n");
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Render the `sitemapindex` referencing every written sitemap file.
pub fn render_sitemap_index(site_url: &str, files: &[String], today: &str) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for file in files {
        xml.push_str("  <sitemap>\n");
        let _ = writeln!(xml, "    <loc>{site_url}/{file}</loc>");
        let _ = writeln!(xml, "    <lastmod>{today}</lastmod>");
        xml.push_str("  </sitemap>\n");
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

/// Validate, chunk, and write one sitemap family. The first chunk is named
/// by `first_name`, later chunks by `numbered_name(n)` — the main sitemap
/// keeps its conventional `sitemap.xml` name while the pSEO family is
/// always numbered.
pub fn write_chunked(
    out_dir: &Path,
    entries: &[SitemapEntry],
    site_url: &str,
    first_name: &str,
    numbered_name: impl Fn(usize) -> String,
) -> Result<Vec<String>, SitemapError> {
    validate_entries(entries, site_url)?;
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();
    for (i, chunk) in chunk_entries(entries).iter().enumerate() {
        let name = if i == 0 {
            first_name.to_string()
        } else {
            numbered_name(i + 1)
        };
        fs::write(out_dir.join(&name), render_urlset(chunk))?;
        written.push(name);
    }
    Ok(written)
}

/// Escape XML-special characters in text content.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_comparison, sample_term};
    use tempfile::TempDir;

    const SITE: &str = "https://blog.test";

    fn entry(loc: &str) -> SitemapEntry {
        SitemapEntry::new(loc.to_string(), "2026-01-15".to_string(), "weekly", 0.8)
    }

    fn many(n: usize) -> Vec<SitemapEntry> {
        (0..n)
            .map(|i| entry(&format!("{SITE}/glossary/term-{i}")))
            .collect()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn valid_entries_pass() {
        validate_entries(&many(3), SITE).unwrap();
    }

    #[test]
    fn relative_loc_rejected() {
        let entries = vec![entry("/glossary/data-lake")];
        assert!(matches!(
            validate_entries(&entries, SITE),
            Err(SitemapError::InvalidLoc(_))
        ));
    }

    #[test]
    fn off_site_loc_rejected() {
        let entries = vec![entry("https://other.test/page")];
        assert!(matches!(
            validate_entries(&entries, SITE),
            Err(SitemapError::InvalidLoc(_))
        ));
    }

    #[test]
    fn bad_lastmod_rejected() {
        let mut e = entry(&format!("{SITE}/x"));
        e.lastmod = "2026-1-15".to_string();
        assert!(matches!(
            validate_entries(&[e], SITE),
            Err(SitemapError::InvalidLastmod { .. })
        ));
    }

    #[test]
    fn out_of_range_priority_rejected() {
        let mut e = entry(&format!("{SITE}/x"));
        e.priority = 1.1;
        assert!(matches!(
            validate_entries(&[e], SITE),
            Err(SitemapError::InvalidPriority { .. })
        ));
    }

    #[test]
    fn lastmod_format_edge_cases() {
        assert!(is_valid_lastmod("2026-01-15"));
        assert!(!is_valid_lastmod("2026-01-15T00:00:00"));
        assert!(!is_valid_lastmod("15-01-2026"));
        assert!(!is_valid_lastmod(""));
        assert!(!is_valid_lastmod("2026/01/15"));
    }

    // =========================================================================
    // Chunking
    // =========================================================================

    #[test]
    fn chunking_respects_protocol_cap() {
        let entries = many(MAX_URLS_PER_FILE + 1);
        let chunks = chunk_entries(&entries);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), MAX_URLS_PER_FILE);
        assert_eq!(chunks[1].len(), 1);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_URLS_PER_FILE);
        }
    }

    #[test]
    fn chunking_is_stable_sequential() {
        let entries = many(MAX_URLS_PER_FILE + 2);
        let chunks = chunk_entries(&entries);
        assert_eq!(chunks[0][0].loc, format!("{SITE}/glossary/term-0"));
        assert_eq!(
            chunks[1][0].loc,
            format!("{SITE}/glossary/term-{MAX_URLS_PER_FILE}")
        );
    }

    #[test]
    fn exactly_at_cap_is_one_file() {
        let entries = many(MAX_URLS_PER_FILE);
        assert_eq!(chunk_entries(&entries).len(), 1);
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn urlset_contains_all_fields() {
        let xml = render_urlset(&many(1));
        assert!(xml.contains("<loc>https://blog.test/glossary/term-0</loc>"));
        assert!(xml.contains("<lastmod>2026-01-15</lastmod>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.8</priority>"));
    }

    #[test]
    fn urlset_escapes_locs() {
        let e = entry(&format!("{SITE}/search?q=a&b=c"));
        let xml = render_urlset(&[e]);
        assert!(xml.contains("<loc>https://blog.test/search?q=a&amp;b=c</loc>"));
    }

    #[test]
    fn image_rendered_when_present() {
        let mut e = entry(&format!("{SITE}/articles/post"));
        e.image = Some(format!("{SITE}/media/cover.png"));
        let xml = render_urlset(&[e]);
        assert!(xml.contains("<image:loc>https://blog.test/media/cover.png</image:loc>"));
    }

    #[test]
    fn sitemap_index_lists_files() {
        let files = vec!["sitemap.xml".to_string(), "sitemap-pseo-1.xml".to_string()];
        let xml = render_sitemap_index(SITE, &files, "2026-03-01");
        assert!(xml.contains("<loc>https://blog.test/sitemap.xml</loc>"));
        assert!(xml.contains("<loc>https://blog.test/sitemap-pseo-1.xml</loc>"));
        assert!(xml.contains("<lastmod>2026-03-01</lastmod>"));
    }

    // =========================================================================
    // Collection
    // =========================================================================

    #[test]
    fn pseo_entries_cover_hubs_and_items() {
        let terms = vec![sample_term("data-lake", "data-warehousing")];
        let cmps = vec![sample_comparison("airflow-vs-prefect", "data-orchestration")];
        let entries = collect_pseo_entries(SITE, terms.iter(), cmps.iter(), "2026-03-01");
        let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://blog.test/glossary",
                "https://blog.test/compare",
                "https://blog.test/glossary/data-lake",
                "https://blog.test/compare/airflow-vs-prefect",
            ]
        );
        // Item lastmod comes from content, not the clock.
        assert_eq!(entries[2].lastmod, "2026-01-15");
        validate_entries(&entries, SITE).unwrap();
    }

    #[test]
    fn main_entries_cover_statics_articles_taxonomies() {
        let index = crate::articles::ArticleIndex {
            synced_at: String::new(),
            articles: vec![crate::articles::Article {
                slug: "post-1".to_string(),
                title: "Post".to_string(),
                keywords: vec![],
                categories: vec![],
                modified: Some("2026-02-20".to_string()),
            }],
            categories: vec![crate::articles::TaxonomyTerm {
                slug: "engineering".to_string(),
                name: "Engineering".to_string(),
            }],
            tags: vec![crate::articles::TaxonomyTerm {
                slug: "dbt".to_string(),
                name: "dbt".to_string(),
            }],
        };
        let entries = collect_main_entries(SITE, &index, "2026-03-01");
        let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
        assert!(locs.contains(&"https://blog.test/"));
        assert!(locs.contains(&"https://blog.test/articles/post-1"));
        assert!(locs.contains(&"https://blog.test/category/engineering"));
        assert!(locs.contains(&"https://blog.test/tag/dbt"));
        validate_entries(&entries, SITE).unwrap();
    }

    // =========================================================================
    // Writing
    // =========================================================================

    #[test]
    fn write_chunked_names_files() {
        let tmp = TempDir::new().unwrap();
        let entries = many(5);
        let files = write_chunked(tmp.path(), &entries, SITE, "sitemap-pseo-1.xml", |n| {
            format!("sitemap-pseo-{n}.xml")
        })
        .unwrap();
        assert_eq!(files, vec!["sitemap-pseo-1.xml"]);
        assert!(tmp.path().join("sitemap-pseo-1.xml").exists());
    }

    #[test]
    fn write_chunked_aborts_on_invalid_entry_without_writing() {
        let tmp = TempDir::new().unwrap();
        let mut entries = many(2);
        entries[1].lastmod = "bad".to_string();
        assert!(write_chunked(tmp.path(), &entries, SITE, "sitemap.xml", |n| format!(
            "sitemap-{n}.xml"
        ))
        .is_err());
        assert!(!tmp.path().join("sitemap.xml").exists());
    }
}
