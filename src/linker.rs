//! Internal-link injection for published pages.
//!
//! Implements the hub-and-spoke linking model: every programmatic page links
//! out to a small number of canonical articles (the hubs), which concentrates
//! link equity instead of spraying it across thousands of near-identical
//! pages. The link graph is bounded by construction:
//!
//! - only the **first** whole-word occurrence of a keyword is linked
//! - each keyword is used at most once per page
//! - each article contributes at most one link per page (its first matching
//!   keyword wins; remaining keywords for that article are skipped)
//! - text already inside a tag or an anchor is never touched
//!
//! The matcher is a character scanner rather than a regex: the rules need
//! lookbehind ("not inside a tag") that `regex` does not support, and the
//! scan keeps tag/anchor tracking explicit.

use std::collections::HashSet;

use crate::articles::Article;
use crate::index::IndexEntry;

/// Inject links from page body HTML to the article index.
///
/// `exclude_slug` skips the article for the page currently being rendered.
/// Keywords are matched case-insensitively on whole words, in the order the
/// articles (and each article's keywords) appear — article order is the
/// priority order.
pub fn inject_article_links(html: &str, articles: &[Article], exclude_slug: &str) -> String {
    let mut result = html.to_string();
    let mut used: HashSet<String> = HashSet::new();

    for article in articles {
        if article.slug == exclude_slug {
            continue;
        }
        for keyword in &article.keywords {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                continue;
            }
            let key = keyword.to_ascii_lowercase();
            if used.contains(&key) {
                continue;
            }
            if already_linked(&result, keyword) {
                continue;
            }
            if let Some((start, end)) = find_linkable(&result, keyword) {
                let matched = result[start..end].to_string();
                let anchor = format!(
                    "<a href=\"/articles/{}\" class=\"internal-link\" title=\"{}\">{}</a>",
                    article.slug,
                    escape_attr(&article.title),
                    matched
                );
                result.replace_range(start..end, &anchor);
                used.insert(key);
                // One link per article.
                break;
            }
        }
    }

    result
}

/// Inject cross-links to other glossary terms mentioned in the body.
///
/// Longer term names are matched first so `"data lake"` does not shadow
/// `"data lakehouse"`. Capped at `max_links` per page.
pub fn inject_term_cross_links(
    html: &str,
    terms: &[IndexEntry],
    current_slug: &str,
    max_links: usize,
) -> String {
    let mut result = html.to_string();
    let mut linked = 0usize;

    let mut sorted: Vec<&IndexEntry> = terms.iter().filter(|t| t.slug != current_slug).collect();
    sorted.sort_by(|a, b| b.title.len().cmp(&a.title.len()).then(a.slug.cmp(&b.slug)));

    for entry in sorted {
        if linked >= max_links {
            break;
        }
        if already_linked(&result, &entry.title) {
            continue;
        }
        if let Some((start, end)) = find_linkable(&result, &entry.title) {
            let matched = result[start..end].to_string();
            let anchor = format!(
                "<a href=\"/glossary/{}\" class=\"glossary-link\" title=\"{}\">{}</a>",
                entry.slug,
                escape_attr(&entry.summary),
                matched
            );
            result.replace_range(start..end, &anchor);
            linked += 1;
        }
    }

    result
}

/// Find the first linkable occurrence of `keyword` in `html`: a
/// case-insensitive whole-word match that sits outside every tag and outside
/// every `<a>…</a>` element. Returns the byte span of the match.
fn find_linkable(html: &str, keyword: &str) -> Option<(usize, usize)> {
    if keyword.is_empty() {
        return None;
    }
    let klen = keyword.len();
    let mut in_tag = false;
    let mut anchor_depth = 0usize;
    let mut prev_char: Option<char> = None;

    for (i, ch) in html.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &html[i..];
            if is_anchor_open(rest) {
                anchor_depth += 1;
            } else if rest.len() >= 4 && rest[..4].eq_ignore_ascii_case("</a>") {
                anchor_depth = anchor_depth.saturating_sub(1);
            }
        } else if ch == '>' {
            in_tag = false;
        } else if !in_tag
            && anchor_depth == 0
            && i + klen <= html.len()
            && html.is_char_boundary(i + klen)
            && html[i..i + klen].eq_ignore_ascii_case(keyword)
        {
            let boundary_before = prev_char.is_none_or(|c| !c.is_alphanumeric());
            let boundary_after = html[i + klen..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
            // The match itself must not cross into a tag.
            let clean = !html[i..i + klen].contains('<');
            if boundary_before && boundary_after && clean {
                return Some((i, i + klen));
            }
        }
        prev_char = Some(ch);
    }
    None
}

/// Whether `rest` (starting at `<`) opens an `<a>` element, as opposed to
/// `<abbr>`, `<article>`, or a closing tag.
fn is_anchor_open(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    bytes.len() >= 3
        && bytes[1].eq_ignore_ascii_case(&b'a')
        && !(bytes[2] as char).is_ascii_alphanumeric()
        && bytes[1] != b'/'
}

/// Whether `keyword` already appears inside any anchor's text. Used to skip
/// keywords that are effectively linked elsewhere in the document.
fn already_linked(html: &str, keyword: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let needle = keyword.to_ascii_lowercase();
    let mut rest = lower.as_str();
    while let Some(open) = rest.find("<a") {
        // "<abbr>" and "<article>" are not anchors.
        if rest[open + 2..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            rest = &rest[open + 2..];
            continue;
        }
        let after_open = &rest[open..];
        let Some(gt) = after_open.find('>') else {
            return false;
        };
        let inner_start = open + gt + 1;
        let Some(close) = rest[inner_start..].find("</a>") else {
            return false;
        };
        let inner = &rest[inner_start..inner_start + close];
        if inner.contains(&needle) {
            return true;
        }
        rest = &rest[inner_start + close + 4..];
    }
    false
}

/// Escape a string for use in an HTML attribute value.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
