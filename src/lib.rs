//! # longtail
//!
//! A programmatic SEO publishing pipeline: sharded JSON content in,
//! deployed static pages out. Thousands of glossary and comparison pages
//! are generated from a category-sharded store, validated for content
//! quality, linked into a hub-and-spoke graph around canonical articles,
//! and shipped incrementally to an object-storage bucket that an edge
//! router serves from.
//!
//! # Architecture: Build → Deploy → Notify
//!
//! ```text
//! 1. index    data/       →  search-index.json   (store → lightweight projection)
//! 2. build    store       →  dist/               (static HTML + sitemaps)
//! 3. deploy   dist/       →  object storage      (hash-diffed incremental upload)
//! 4. notify   sitemaps    →  push indexing       (IndexNow, 24h rate window)
//! ```
//!
//! Each stage owns exactly one artifact and each on-disk cache has exactly
//! one owner, so stages can be rerun independently and a lost cache only
//! costs redundant work, never correctness. The edge router is the one
//! long-running piece: a stateless, share-nothing dispatch layer that
//! serves `/glossary/*` and `/compare/*` from the bucket and forwards
//! everything else to the origin.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Category-sharded content store: registry, shards, invariants |
//! | [`index`] | Search index builder and the lazy [`index::PageLoader`] |
//! | [`validate`] | Content-quality checks: depth, shingle similarity, content hash |
//! | [`articles`] | Article index sync from the content source API |
//! | [`linker`] | Hub-and-spoke internal-link injection |
//! | [`render`] | Maud templates producing deterministic static HTML |
//! | [`sitemap`] | Validated, 25k-chunked XML sitemaps plus the sitemap index |
//! | [`llm`] | LLM-oriented JSON sitemap with heuristic extraction |
//! | [`storage`] | S3-compatible object store client (SigV4, pure Rust) |
//! | [`deploy`] | Incremental uploader: hash cache, orphan GC, failure isolation |
//! | [`notify`] | IndexNow push notifier with a 24-hour rate window |
//! | [`router`] | Edge request router: bucket for pSEO paths, origin for the rest |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI summaries: pure `format_*` functions plus `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## Deterministic Rendering
//!
//! The renderer reads no clock and no randomness; every date in a page
//! comes from the content's own `lastUpdated` field. Re-rendering
//! unchanged input is byte-identical, which is what makes the deploy
//! uploader's hash diffing sufficient for change detection — no mtimes,
//! no build counters.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): compile-time
//! checked templates, auto-escaped interpolation, no template directory to
//! drift out of sync. The only `PreEscaped` insertions are markdown output
//! and JSON-LD payloads, both produced by this crate.
//!
//! ## Explicit Caches, One Owner Each
//!
//! `.pseo-cache.json` (deploy hashes), `.articles-cache.json` (article
//! sync fallback), and `.notification-cache.json` (notifier window) are
//! each read and written by exactly one module, passed around as values
//! rather than ambient globals, and safe to delete — the worst case is one
//! redundant full pass.
//!
//! ## Sequential Network I/O
//!
//! Pagination, uploads, and notifications run one request at a time with
//! explicit timeouts and small politeness delays. Only CPU-bound page
//! rendering fans out (rayon). Throughput is deliberately traded for
//! simplicity and gentleness toward the upstream API.

pub mod articles;
pub mod config;
pub mod deploy;
pub mod index;
pub mod linker;
pub mod llm;
pub mod notify;
pub mod output;
pub mod render;
pub mod router;
pub mod sitemap;
pub mod storage;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
