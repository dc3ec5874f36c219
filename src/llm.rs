//! LLM-oriented sitemap: a single JSON artifact with one enriched record
//! per article, built so answer engines can cite content without crawling
//! every page.
//!
//! Each record carries heuristic extractions: numeric/statistical key
//! facts, named entities matched against a fixed vocabulary of known tools,
//! and a best-effort "question answered" derived from the title or the
//! first question-shaped heading.
//!
//! The extractors are best-effort by contract: they return empty values
//! rather than failing, and one article's bad markup can only degrade that
//! article's record. The whole artifact falls back to the previously
//! generated file when the content API is unreachable — generation never
//! fails a build unless there is no data *and* no previous artifact.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::articles::{self, SourcePost, SyncError};
use crate::config::SiteConfig;
use crate::validate::strip_markup;

/// Artifact filename within the output directory.
pub const LLM_SITEMAP_FILENAME: &str = "llm-sitemap.json";

/// Known tool/technology names matched as entities.
const ENTITY_VOCABULARY: &[&str] = &[
    "Snowflake",
    "AWS",
    "Azure",
    "GCP",
    "Python",
    "SQL",
    "dbt",
    "Airflow",
    "Databricks",
    "Kafka",
    "Spark",
    "Redshift",
    "BigQuery",
    "Tableau",
    "Power BI",
    "Docker",
    "Kubernetes",
];

const MAX_KEY_FACTS: usize = 5;
const MAX_ENTITIES: usize = 10;

/// One enriched article record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPage {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub key_facts: Vec<String>,
    pub entities: Vec<String>,
    pub question_answered: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    pub category: String,
    pub word_count: usize,
}

/// The whole artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSitemap {
    pub site: String,
    pub last_updated: String,
    pub total_articles: usize,
    pub pages: Vec<LlmPage>,
}

/// Build one record from a post. Pure and infallible: extraction gaps
/// become empty fields.
pub fn build_page(
    post: &SourcePost,
    site_url: &str,
    category_names: &HashMap<u64, String>,
) -> LlmPage {
    let title = articles::clean_title(&post.title.rendered);
    let content_html = &post.content.rendered;
    let content_text = collapse_whitespace(&strip_markup(content_html));

    LlmPage {
        url: format!("{site_url}/articles/{}", post.slug),
        title: title.clone(),
        summary: extract_summary(content_html, &post.excerpt.rendered),
        key_facts: extract_key_facts(&content_text),
        entities: extract_entities(&content_text),
        question_answered: extract_question_answered(&title, content_html),
        last_updated: date_only(post.modified.as_deref().or(post.date.as_deref())),
        published: date_only(post.date.as_deref()),
        category: post
            .categories
            .first()
            .and_then(|id| category_names.get(id).cloned())
            .unwrap_or_default(),
        word_count: content_text.split_whitespace().count(),
    }
}

fn date_only(value: Option<&str>) -> Option<String> {
    value.map(|v| v.split('T').next().unwrap_or(v).to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull numeric/statistical substrings and definition-shaped sentences.
pub fn extract_key_facts(text: &str) -> Vec<String> {
    let mut facts = Vec::new();

    // Percentages and quantities with a recognized unit.
    let stats = Regex::new(
        r"(?i)\d+(?:\.\d+)?%|\d+(?:,\d{3})*(?:\.\d+)?\s*(?:million|billion|thousand|MB|GB|TB|ms|seconds?|minutes?)",
    )
    .expect("static pattern");
    for m in stats.find_iter(text).take(3) {
        facts.push(m.as_str().to_string());
    }

    // Definition-shaped sentences ("X is ...", "Y refers to ...").
    let definition = Regex::new(r"(?i)\b(?:is|are|means?|refers?\s+to)\s+").expect("static pattern");
    let sentences = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > 20 && s.len() < 200)
        .filter(|s| definition.is_match(s))
        .take(2);
    facts.extend(sentences.map(str::to_string));

    facts.truncate(MAX_KEY_FACTS);
    facts
}

/// Match known tool names; lowercased, deduplicated, capped.
pub fn extract_entities(text: &str) -> Vec<String> {
    let pattern = format!(r"(?i)\b(?:{})\b", ENTITY_VOCABULARY.join("|"));
    let re = Regex::new(&pattern).expect("static pattern");

    let mut seen = std::collections::HashSet::new();
    let mut entities = Vec::new();
    for m in re.find_iter(text) {
        let entity = m.as_str().to_lowercase();
        if seen.insert(entity.clone()) {
            entities.push(entity);
            if entities.len() == MAX_ENTITIES {
                break;
            }
        }
    }
    entities
}

/// The question this article answers: an interrogative title wins, then the
/// first `<h2>`/`<h3>` heading containing a question mark, then a generated
/// "How to …" from the title.
pub fn extract_question_answered(title: &str, content_html: &str) -> String {
    let interrogative =
        Regex::new(r"(?i)^(?:what|why|how|when|where|who|can|is|are|do|does)\s").expect("static pattern");
    if interrogative.is_match(title) {
        return title.to_string();
    }

    let heading = Regex::new(r"(?is)<h[23][^>]*>([^<]*\?[^<]*)</h[23]>").expect("static pattern");
    if let Some(cap) = heading.captures(content_html)
        && let Some(m) = cap.get(1)
    {
        return collapse_whitespace(m.as_str());
    }

    format!("How to {}", title.to_lowercase())
}

/// Summary: the excerpt when it is usably sized, else the first paragraph
/// truncated, else empty.
pub fn extract_summary(content_html: &str, excerpt_html: &str) -> String {
    let excerpt = collapse_whitespace(&strip_markup(excerpt_html));
    if excerpt.len() > 50 && excerpt.len() < 300 {
        return excerpt;
    }

    let first_para = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("static pattern");
    if let Some(cap) = first_para.captures(content_html)
        && let Some(m) = cap.get(1)
    {
        let clean = collapse_whitespace(&strip_markup(m.as_str()));
        if clean.len() > 50 {
            let truncated: String = clean.chars().take(250).collect();
            return format!("{truncated}...");
        }
    }

    String::new()
}

/// Generate the artifact: fetch posts with full content, extract, write to
/// the output directory. Falls back to the previous artifact when the
/// content API is down.
pub async fn generate(config: &SiteConfig, today: &str) -> Result<LlmSitemap, SyncError> {
    let out_path = Path::new(&config.output_dir).join(LLM_SITEMAP_FILENAME);

    let posts = match articles::fetch_all_posts(
        config,
        "slug,title,excerpt,content,date,modified,categories",
    )
    .await
    {
        Ok(posts) if !posts.is_empty() => posts,
        Ok(_) | Err(SyncError::Upstream(_)) if out_path.exists() => {
            eprintln!("Warning: content API unavailable, keeping existing LLM sitemap");
            let content = fs::read_to_string(&out_path)?;
            return Ok(serde_json::from_str(&content)?);
        }
        Ok(_) => return Err(SyncError::NoData),
        Err(e) => return Err(e),
    };

    // Category names for the first-category label; resolution failures just
    // leave the label empty.
    let category_names: HashMap<u64, String> =
        match articles::fetch_taxonomy(config, "categories").await {
            Ok(terms) => terms.into_iter().map(|t| (t.id, t.name)).collect(),
            Err(_) => HashMap::new(),
        };

    let site_url = config.require_site_url()?;
    let pages: Vec<LlmPage> = posts
        .iter()
        .map(|post| build_page(post, site_url, &category_names))
        .collect();

    let sitemap = LlmSitemap {
        site: config.site_host()?,
        last_updated: today.to_string(),
        total_articles: pages.len(),
        pages,
    };

    fs::create_dir_all(&config.output_dir)?;
    fs::write(&out_path, serde_json::to_string_pretty(&sitemap)?)?;
    Ok(sitemap)
}
