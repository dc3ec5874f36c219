//! Static HTML page rendering.
//!
//! Turns one validated content item into a self-contained HTML document:
//! title, meta description, canonical URL, Open Graph tags, the full body
//! with internal links injected, a FAQ section, and schema.org structured
//! data (`FAQPage` whenever at least one FAQ exists, `BreadcrumbList`
//! always, `Article` for comparisons).
//!
//! ## Determinism
//!
//! Rendering is a pure function of its inputs. No clock reads, no random
//! values, no build counters — re-rendering unchanged input produces
//! byte-identical output, which is what lets the deploy uploader's hash
//! diffing skip unchanged pages. All dates in a page come from the item's
//! own `lastUpdated` field and are simply omitted when absent.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating:
//! type-safe templates with automatic XSS escaping. Markdown bodies go
//! through pulldown-cmark; the resulting HTML (and the JSON-LD payloads)
//! are the only `PreEscaped` insertions.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use serde_json::json;

use crate::articles::Article;
use crate::index::SearchIndex;
use crate::linker;
use crate::store::{Category, Comparison, Faq, GlossaryTerm};

const CSS: &str = include_str!("../static/pseo.css");

/// How many glossary cross-links one page may carry.
const MAX_CROSS_LINKS: usize = 5;

/// Everything a page render needs besides the item itself.
pub struct RenderContext<'a> {
    pub site_url: &'a str,
    pub site_name: &'a str,
    pub categories: &'a [Category],
    pub articles: &'a [Article],
    pub index: &'a SearchIndex,
}

impl RenderContext<'_> {
    fn category_name(&self, id: &str) -> String {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn page_title(&self, title: &str) -> String {
        if self.site_name.is_empty() {
            title.to_string()
        } else {
            format!("{title} | {}", self.site_name)
        }
    }
}

/// Convert a markdown body to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Render one glossary term to a complete HTML document.
pub fn render_glossary_page(term: &GlossaryTerm, ctx: &RenderContext) -> String {
    let canonical = format!("{}/glossary/{}", ctx.site_url, term.slug);
    let category_name = ctx.category_name(&term.category);

    let mut body_html = markdown_to_html(&term.full_definition);
    body_html = linker::inject_article_links(&body_html, ctx.articles, "");
    body_html = linker::inject_term_cross_links(
        &body_html,
        &ctx.index.glossary,
        &term.slug,
        MAX_CROSS_LINKS,
    );

    let breadcrumbs = [
        ("Home", ctx.site_url.to_string()),
        ("Glossary", format!("{}/glossary", ctx.site_url)),
        (term.term.as_str(), canonical.clone()),
    ];

    let content = html! {
        div.container {
            nav.breadcrumb {
                a href="/" { "Home" } " → "
                a href="/glossary" { "Glossary" } " → "
                (term.term)
            }
            span.category-badge { (category_name) }
            h1 { (term.term) }
            p.summary { (term.short_definition) }
            @if !term.key_points.is_empty() {
                ul.key-points {
                    @for point in &term.key_points {
                        li { (point) }
                    }
                }
            }
            div.article-body {
                (PreEscaped(&body_html))
            }
            (faq_section(&term.faqs))
            @if !term.related_terms.is_empty() {
                div.related-terms {
                    h3 { "Related Terms" }
                    div.term-links {
                        @for slug in &term.related_terms {
                            a.related-link href={ "/glossary/" (slug) } { (slug) }
                        }
                    }
                }
            }
            @if !term.external_links.is_empty() {
                div.external-links {
                    h3 { "Learn More" }
                    ul {
                        @for link in &term.external_links {
                            li {
                                a href=(link.url) target="_blank" rel="noopener" { (link.title) }
                            }
                        }
                    }
                }
            }
            a.back-link href="/glossary" { "← Back to Glossary" }
            (site_footer(ctx))
        }
    };

    let mut schemas = vec![breadcrumb_schema(&breadcrumbs)];
    if let Some(faq) = faq_schema(&term.faqs) {
        schemas.push(faq);
    }

    document(
        &ctx.page_title(&term.term),
        &term.short_definition,
        &canonical,
        ctx,
        &schemas,
        content,
    )
    .into_string()
}

/// Render one comparison to a complete HTML document.
pub fn render_comparison_page(cmp: &Comparison, ctx: &RenderContext) -> String {
    let title = cmp.title();
    let canonical = format!("{}/compare/{}", ctx.site_url, cmp.slug);

    let mut intro_html = markdown_to_html(&cmp.intro);
    intro_html = linker::inject_article_links(&intro_html, ctx.articles, "");
    intro_html = linker::inject_term_cross_links(
        &intro_html,
        &ctx.index.glossary,
        &cmp.slug,
        MAX_CROSS_LINKS,
    );

    let breadcrumbs = [
        ("Home", ctx.site_url.to_string()),
        ("Comparisons", format!("{}/compare", ctx.site_url)),
        (title.as_str(), canonical.clone()),
    ];

    let content = html! {
        div.container {
            nav.breadcrumb {
                a href="/" { "Home" } " → "
                a href="/compare" { "Comparisons" } " → "
                (title)
            }
            h1 { (title) }
            div.verdict-box {
                div.verdict-label { "Quick Verdict" }
                div.winner { "Winner: " (cmp.winner.as_deref().unwrap_or("It Depends")) }
                p { (cmp.short_verdict) }
            }
            @if !cmp.intro.is_empty() {
                section {
                    h2 { "Introduction" }
                    div.article-body { (PreEscaped(&intro_html)) }
                }
            }
            @if !cmp.features.is_empty() {
                section {
                    h2 { "Feature Comparison" }
                    table {
                        thead {
                            tr {
                                th { "Feature" }
                                th { (cmp.tool_a) }
                                th { (cmp.tool_b) }
                                th { "Winner" }
                            }
                        }
                        tbody {
                            @for row in &cmp.features {
                                tr {
                                    td { (row.feature) }
                                    td { (row.tool_a_value) }
                                    td { (row.tool_b_value) }
                                    td { (row.winner.as_deref().unwrap_or("Tie")) }
                                }
                            }
                        }
                    }
                }
            }
            @if !cmp.pros.tool_a.is_empty() || !cmp.pros.tool_b.is_empty() {
                div.pros-cons {
                    (side_list("pros", &format!("{} Pros", cmp.tool_a), &cmp.pros.tool_a))
                    (side_list("pros", &format!("{} Pros", cmp.tool_b), &cmp.pros.tool_b))
                    (side_list("cons", &format!("{} Cons", cmp.tool_a), &cmp.cons.tool_a))
                    (side_list("cons", &format!("{} Cons", cmp.tool_b), &cmp.cons.tool_b))
                }
            }
            @if !cmp.final_verdict.is_empty() {
                section.final-verdict {
                    h2 { "Final Verdict" }
                    (cmp.final_verdict)
                }
            }
            (faq_section(&cmp.faqs))
            a.back-link href="/compare" { "← Back to Comparisons" }
            (site_footer(ctx))
        }
    };

    let mut schemas = vec![
        breadcrumb_schema(&breadcrumbs),
        article_schema(cmp, &title, &canonical, ctx),
    ];
    if let Some(faq) = faq_schema(&cmp.faqs) {
        schemas.push(faq);
    }

    document(
        &ctx.page_title(&title),
        &cmp.short_verdict,
        &canonical,
        ctx,
        &schemas,
        content,
    )
    .into_string()
}

// ============================================================================
// Document skeleton and shared components
// ============================================================================

fn document(
    title: &str,
    description: &str,
    canonical: &str,
    ctx: &RenderContext,
    schemas: &[String],
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                meta name="description" content=(description);
                link rel="canonical" href=(canonical);
                meta name="robots" content="index, follow, max-snippet:-1, max-image-preview:large";
                meta property="og:type" content="article";
                meta property="og:url" content=(canonical);
                meta property="og:title" content=(title);
                meta property="og:description" content=(description);
                @if !ctx.site_name.is_empty() {
                    meta property="og:site_name" content=(ctx.site_name);
                }
                @for schema in schemas {
                    script type="application/ld+json" { (PreEscaped(schema)) }
                }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

fn faq_section(faqs: &[Faq]) -> Markup {
    html! {
        @if !faqs.is_empty() {
            section.faq-section {
                h2 { "Frequently Asked Questions" }
                @for faq in faqs {
                    div.faq-item {
                        h3 { (faq.question) }
                        p { (faq.answer) }
                    }
                }
            }
        }
    }
}

fn side_list(class: &str, heading: &str, items: &[String]) -> Markup {
    html! {
        @if !items.is_empty() {
            div class=(class) {
                h3 { (heading) }
                ul {
                    @for item in items {
                        li { (item) }
                    }
                }
            }
        }
    }
}

fn site_footer(ctx: &RenderContext) -> Markup {
    html! {
        footer.site-footer {
            div.footer-links {
                a href="/" { "Home" }
                a href="/glossary" { "Glossary" }
                a href="/compare" { "Comparisons" }
                a href="/about" { "About" }
                a href="/privacy-policy" { "Privacy Policy" }
            }
            @if !ctx.site_name.is_empty() {
                div.footer-copy { (ctx.site_name) }
            }
        }
    }
}

// ============================================================================
// Structured data (JSON-LD)
// ============================================================================

/// Serialize a schema.org value for embedding in a `<script>` element.
/// `</` is escaped so body text can never terminate the script block.
fn json_ld(value: &serde_json::Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .replace("</", "<\\/")
}

/// `FAQPage` schema; `None` when the item has no FAQs.
pub fn faq_schema(faqs: &[Faq]) -> Option<String> {
    if faqs.is_empty() {
        return None;
    }
    let entities: Vec<serde_json::Value> = faqs
        .iter()
        .map(|faq| {
            json!({
                "@type": "Question",
                "name": faq.question,
                "acceptedAnswer": {
                    "@type": "Answer",
                    "text": faq.answer,
                }
            })
        })
        .collect();
    Some(json_ld(&json!({
        "@context": "https://schema.org",
        "@type": "FAQPage",
        "mainEntity": entities,
    })))
}

fn breadcrumb_schema(crumbs: &[(&str, String)]) -> String {
    let items: Vec<serde_json::Value> = crumbs
        .iter()
        .enumerate()
        .map(|(i, (name, url))| {
            json!({
                "@type": "ListItem",
                "position": i + 1,
                "name": name,
                "item": url,
            })
        })
        .collect();
    json_ld(&json!({
        "@context": "https://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": items,
    }))
}

fn article_schema(cmp: &Comparison, title: &str, canonical: &str, ctx: &RenderContext) -> String {
    let mut value = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": format!("{title}: Complete Comparison"),
        "description": cmp.short_verdict,
        "mainEntityOfPage": { "@type": "WebPage", "@id": canonical },
    });
    if !ctx.site_name.is_empty() {
        value["publisher"] = json!({
            "@type": "Organization",
            "name": ctx.site_name,
            "url": ctx.site_url,
        });
    }
    // Dates come from content only; pages without lastUpdated carry none.
    if let Some(date) = &cmp.last_updated {
        value["datePublished"] = json!(date);
        value["dateModified"] = json!(date);
    }
    json_ld(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndex;
    use crate::test_helpers::{sample_comparison, sample_term, seed_store};
    use tempfile::TempDir;

    fn with_context<R>(f: impl FnOnce(&RenderContext) -> R) -> R {
        let tmp = TempDir::new().unwrap();
        let store = seed_store(tmp.path());
        let categories = store.categories().unwrap();
        let index = SearchIndex::build(&store).unwrap();
        let articles = vec![Article {
            slug: "airflow-tutorial".to_string(),
            title: "Airflow Tutorial".to_string(),
            keywords: vec!["Airflow".to_string()],
            categories: vec![],
            modified: None,
        }];
        let ctx = RenderContext {
            site_url: "https://blog.test",
            site_name: "Test Hub",
            categories: &categories,
            articles: &articles,
            index: &index,
        };
        f(&ctx)
    }

    // =========================================================================
    // Glossary pages
    // =========================================================================

    #[test]
    fn glossary_page_has_required_elements() {
        with_context(|ctx| {
            let term = sample_term("data-lake", "data-warehousing");
            let html = render_glossary_page(&term, ctx);
            assert!(html.starts_with("<!DOCTYPE html>"));
            assert!(html.contains("<title>Data Lake | Test Hub</title>"));
            assert!(html.contains(
                "<link rel=\"canonical\" href=\"https://blog.test/glossary/data-lake\">"
            ));
            assert!(html.contains("meta name=\"description\""));
            assert!(html.contains("Data Warehousing")); // category badge, not raw id
            assert!(html.contains("Frequently Asked Questions"));
        });
    }

    #[test]
    fn rendering_is_byte_identical_across_runs() {
        with_context(|ctx| {
            let term = sample_term("data-lake", "data-warehousing");
            assert_eq!(
                render_glossary_page(&term, ctx),
                render_glossary_page(&term, ctx)
            );
            let cmp = sample_comparison("airflow-vs-prefect", "data-orchestration");
            assert_eq!(
                render_comparison_page(&cmp, ctx),
                render_comparison_page(&cmp, ctx)
            );
        });
    }

    #[test]
    fn faq_schema_present_with_faqs() {
        with_context(|ctx| {
            let term = sample_term("data-lake", "data-warehousing");
            let html = render_glossary_page(&term, ctx);
            assert!(html.contains("\"@type\":\"FAQPage\""));
            assert!(html.contains("\"@type\":\"Question\""));
            assert!(html.contains("\"@type\":\"Answer\""));
        });
    }

    #[test]
    fn faq_schema_absent_without_faqs() {
        with_context(|ctx| {
            let mut term = sample_term("data-lake", "data-warehousing");
            term.faqs.clear();
            let html = render_glossary_page(&term, ctx);
            assert!(!html.contains("FAQPage"));
            assert!(!html.contains("Frequently Asked Questions"));
        });
    }

    #[test]
    fn body_markdown_is_rendered() {
        with_context(|ctx| {
            let term = sample_term("data-lake", "data-warehousing");
            let html = render_glossary_page(&term, ctx);
            assert!(html.contains("<h2>How it works</h2>"));
        });
    }

    #[test]
    fn article_links_bounded_by_article_count() {
        with_context(|ctx| {
            let term = sample_term("data-lake", "data-warehousing");
            // Body mentions Airflow; the one article may contribute one link.
            let html = render_glossary_page(&term, ctx);
            let count = html.matches("class=\"internal-link\"").count();
            assert_eq!(count, 1);
            assert!(count <= ctx.articles.len());
            assert!(html.contains("href=\"/articles/airflow-tutorial\""));
        });
    }

    #[test]
    fn user_text_is_escaped() {
        with_context(|ctx| {
            let mut term = sample_term("data-lake", "data-warehousing");
            term.short_definition = "Storage <script>alert(1)</script> layer".to_string();
            let html = render_glossary_page(&term, ctx);
            assert!(!html.contains("<script>alert(1)</script>"));
        });
    }

    // =========================================================================
    // Comparison pages
    // =========================================================================

    #[test]
    fn comparison_page_has_table_and_verdict() {
        with_context(|ctx| {
            let cmp = sample_comparison("airflow-vs-prefect", "data-orchestration");
            let html = render_comparison_page(&cmp, ctx);
            assert!(html.contains("<h1>Apache Airflow vs Prefect</h1>"));
            assert!(html.contains("Feature Comparison"));
            assert!(html.contains("Winner: It Depends"));
            assert!(html.contains("Final Verdict"));
            assert!(html.contains(
                "<link rel=\"canonical\" href=\"https://blog.test/compare/airflow-vs-prefect\">"
            ));
        });
    }

    #[test]
    fn comparison_dates_come_from_content_only() {
        with_context(|ctx| {
            let mut cmp = sample_comparison("airflow-vs-prefect", "data-orchestration");
            cmp.last_updated = Some("2026-02-01".to_string());
            let html = render_comparison_page(&cmp, ctx);
            assert!(html.contains("\"datePublished\":\"2026-02-01\""));

            cmp.last_updated = None;
            let html = render_comparison_page(&cmp, ctx);
            assert!(!html.contains("datePublished"));
        });
    }

    // =========================================================================
    // JSON-LD helpers
    // =========================================================================

    #[test]
    fn json_ld_escapes_script_terminator() {
        let value = json!({"text": "</script><b>x</b>"});
        let out = json_ld(&value);
        assert!(!out.contains("</script>"));
    }

    #[test]
    fn faq_schema_none_for_empty() {
        assert!(faq_schema(&[]).is_none());
    }
}
