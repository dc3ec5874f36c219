use clap::{Parser, Subcommand};
use longtail::{articles, config, deploy, index, llm, notify, output, render, router, sitemap, store, validate};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "longtail")]
#[command(about = "Programmatic SEO publishing pipeline")]
#[command(long_about = "\
Programmatic SEO publishing pipeline

Sharded JSON content in, deployed static pages out. Content lives in a
category-sharded store; pages are rendered deterministically, shipped
incrementally to object storage, and served by an edge router.

Data layout:

  data/
  ├── categories.json              # Category registry (id, name, description)
  ├── glossary/
  │   └── <category-id>.json       # Glossary terms, one file per category
  ├── comparisons/
  │   └── <category-id>.json       # Tool comparisons, one file per category
  ├── articles.json                # Synced article index (sync-articles)
  └── search-index.json            # Derived search index (index/build)

Typical flow:

  longtail sync-articles           # refresh the article index
  longtail check                   # validate the store, report quality warnings
  longtail build                   # index + render + sitemaps → dist/
  longtail deploy                  # incremental upload + orphan cleanup
  longtail notify                  # push changed URLs to IndexNow

Storage credentials come from the environment (R2_ENDPOINT,
R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY, R2_BUCKET_NAME); a .env file is
honored. Run 'longtail gen-config' for a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that talk to external services.
#[derive(clap::Args, Clone)]
struct DeployArgs {
    /// Compute everything but perform no network writes
    #[arg(long)]
    dry_run: bool,
    /// Ignore the change-detection cache and process everything
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the content store and report content-quality warnings
    Check,
    /// Rebuild the search index from the store
    Index,
    /// Full build: index, render all pages, generate sitemaps
    Build,
    /// Refresh the article index from the content source API
    SyncArticles,
    /// Regenerate the LLM-oriented JSON sitemap
    LlmSitemap,
    /// Upload changed output files to object storage and delete orphans
    Deploy(DeployArgs),
    /// Submit changed URLs to the IndexNow push-indexing API
    Notify {
        /// Bypass the 24-hour window and resubmit every URL
        #[arg(long)]
        force: bool,
        /// Resubmit every URL (still subject to endpoint acceptance)
        #[arg(long)]
        all: bool,
    },
    /// Run the edge router
    Serve,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = config::SiteConfig::load(&cli.config)?;

    match cli.command {
        Command::Check => run_check(&config)?,
        Command::Index => {
            let cat_store = store::CategoryStore::new(&config.data_dir);
            let search_index = index::SearchIndex::build(&cat_store)?;
            search_index.save(Path::new(&config.data_dir))?;
            println!(
                "Indexed {} glossary terms and {} comparisons",
                search_index.glossary.len(),
                search_index.comparisons.len()
            );
        }
        Command::Build => run_build(&config)?,
        Command::SyncArticles => {
            let article_index = articles::sync(&config).await?;
            println!(
                "Synced {} articles, {} categories, {} tags",
                article_index.articles.len(),
                article_index.categories.len(),
                article_index.tags.len()
            );
        }
        Command::LlmSitemap => {
            let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
            let sitemap = llm::generate(&config, &today).await?;
            println!(
                "LLM sitemap: {} articles → {}/{}",
                sitemap.total_articles,
                config.output_dir,
                llm::LLM_SITEMAP_FILENAME
            );
        }
        Command::Deploy(args) => {
            let report = deploy::deploy(&config, args.dry_run, args.force).await?;
            output::print_lines(&output::format_deploy_summary(&report));
            if !report.ok() {
                return Err(format!(
                    "deploy finished with {} failed operations",
                    report.failures.len()
                )
                .into());
            }
        }
        Command::Notify { force, all } => {
            let outcome = notify::notify(&config, force, all).await?;
            output::print_lines(&output::format_notify_outcome(&outcome));
        }
        Command::Serve => router::serve(&config).await?,
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Validate store invariants (fatal) and content quality (advisory).
fn run_check(config: &config::SiteConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cat_store = store::CategoryStore::new(&config.data_dir);
    store::validate_store(&cat_store)?;

    let categories = cat_store.categories()?;
    let glossary = cat_store.load_glossary()?;
    let comparisons = cat_store.load_comparisons()?;

    let mut warnings = Vec::new();
    for terms in glossary.values() {
        for term in terms {
            let report = validate::validate_depth(&term.full_definition, term.faqs.len());
            for violation in report.violations {
                warnings.push(format!("glossary/{}: {violation}", term.slug));
            }
        }
        // Near-duplicate scan stays within one category shard; cross-category
        // pages target different queries and rarely collide.
        for (i, a) in terms.iter().enumerate() {
            for b in &terms[i + 1..] {
                let score = validate::similarity(&a.full_definition, &b.full_definition);
                if validate::is_probable_duplicate(score) {
                    warnings.push(format!(
                        "glossary/{} and glossary/{} look like duplicates (similarity {score:.2})",
                        a.slug, b.slug
                    ));
                }
            }
        }
    }
    for shard in comparisons.values() {
        for cmp in shard {
            let report = validate::validate_depth(&cmp.final_verdict, cmp.faqs.len());
            for violation in report.violations {
                warnings.push(format!("compare/{}: {violation}", cmp.slug));
            }
        }
    }

    let glossary_count: usize = glossary.values().map(Vec::len).sum();
    let comparison_count: usize = comparisons.values().map(Vec::len).sum();
    output::print_lines(&output::format_check_output(
        categories.len(),
        glossary_count,
        comparison_count,
        &warnings,
    ));
    println!("==> Store is valid");
    Ok(())
}

/// Full build: index → pages → sitemaps. Stages are strictly ordered; the
/// index must exist before pages or sitemaps consume it.
fn run_build(config: &config::SiteConfig) -> Result<(), Box<dyn std::error::Error>> {
    let site_url = config.require_site_url()?.to_string();
    let data_dir = Path::new(&config.data_dir);
    let out_dir = Path::new(&config.output_dir);

    let cat_store = store::CategoryStore::new(&config.data_dir);
    store::validate_store(&cat_store)?;

    println!("==> Stage 1: Indexing {}", config.data_dir);
    let search_index = index::SearchIndex::build(&cat_store)?;
    search_index.save(data_dir)?;

    println!("==> Stage 2: Rendering pages → {}", config.output_dir);
    let categories = cat_store.categories()?;
    let glossary = cat_store.load_glossary()?;
    let comparisons = cat_store.load_comparisons()?;
    let article_index = articles::ArticleIndex::load_or_empty(data_dir);

    let ctx = render::RenderContext {
        site_url: &site_url,
        site_name: &config.site_name,
        categories: &categories,
        articles: &article_index.articles,
        index: &search_index,
    };

    let terms: Vec<&store::GlossaryTerm> = glossary.values().flatten().collect();
    terms
        .par_iter()
        .map(|term| {
            let html = render::render_glossary_page(term, &ctx);
            write_page(
                out_dir,
                store::ContentKind::Glossary.url_prefix(),
                &term.slug,
                &html,
            )
        })
        .collect::<Result<Vec<()>, std::io::Error>>()?;

    let cmps: Vec<&store::Comparison> = comparisons.values().flatten().collect();
    cmps.par_iter()
        .map(|cmp| {
            let html = render::render_comparison_page(cmp, &ctx);
            write_page(
                out_dir,
                store::ContentKind::Comparison.url_prefix(),
                &cmp.slug,
                &html,
            )
        })
        .collect::<Result<Vec<()>, std::io::Error>>()?;

    println!("==> Stage 3: Generating sitemaps");
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let main_entries = sitemap::collect_main_entries(&site_url, &article_index, &today);
    let pseo_entries = sitemap::collect_pseo_entries(
        &site_url,
        glossary.values().flatten(),
        comparisons.values().flatten(),
        &today,
    );

    let mut files = sitemap::write_chunked(out_dir, &main_entries, &site_url, "sitemap.xml", |n| {
        format!("sitemap-{n}.xml")
    })?;
    files.extend(sitemap::write_chunked(
        out_dir,
        &pseo_entries,
        &site_url,
        "sitemap-pseo-1.xml",
        |n| format!("sitemap-pseo-{n}.xml"),
    )?);

    let index_xml = sitemap::render_sitemap_index(&site_url, &files, &today);
    fs::write(out_dir.join("sitemap-index.xml"), index_xml)?;
    files.push("sitemap-index.xml".to_string());

    output::print_lines(&output::format_build_output(
        terms.len(),
        cmps.len(),
        &files,
        &config.output_dir,
    ));
    println!("==> Build complete: {}", config.output_dir);
    Ok(())
}

fn write_page(out_dir: &Path, prefix: &str, slug: &str, html: &str) -> Result<(), std::io::Error> {
    let dir = out_dir.join(prefix).join(slug);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("index.html"), html)
}
