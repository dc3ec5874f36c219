//! Incremental deployment to object storage.
//!
//! Rendering is deterministic, so a content hash per output file is enough
//! to know exactly what changed since the last deploy. This module owns the
//! `.pseo-cache.json` manifest mapping each uploaded key to the SHA-256 of
//! the content last successfully uploaded, and uses it to skip everything
//! unchanged — a no-change rebuild produces an empty upload set.
//!
//! The cache is convenience, not correctness: losing it only costs one full
//! re-upload. It is loaded empty on corruption or a version bump, exactly
//! like a first run.
//!
//! ## Failure semantics
//!
//! One file's failed upload never aborts the rest. Failures are collected,
//! reported in the final summary, and leave that key's cache entry
//! untouched so the next run retries it. The process exits non-zero when
//! any failure occurred.
//!
//! ## Orphan cleanup
//!
//! After uploads, remote keys that no longer correspond to any output file
//! (removed terms, renamed slugs) are deleted so stale pages stop being
//! served. `--dry-run` computes the full plan — uploads and deletions —
//! without a single network write.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::storage::{ObjectStore, StorageError};

/// Deploy cache manifest at the project root.
pub const DEPLOY_CACHE_FILE: &str = ".pseo-cache.json";

/// Bump to invalidate existing caches when the format changes.
const CACHE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Output directory {0} not found — run `longtail build` first")]
    MissingOutput(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// On-disk manifest of last-deployed content hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployCache {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<String>,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
}

impl DeployCache {
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            last_build: None,
            hashes: BTreeMap::new(),
        }
    }

    /// Load from the project root. Missing, corrupt, or version-mismatched
    /// files all yield an empty cache — the penalty is one full re-upload.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::empty();
        };
        let Ok(cache) = serde_json::from_str::<Self>(&content) else {
            return Self::empty();
        };
        if cache.version != CACHE_VERSION {
            return Self::empty();
        }
        cache
    }

    pub fn save(&self, path: &Path) -> Result<(), DeployError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// What a deploy run decided to do, before any network traffic.
#[derive(Debug, Default)]
pub struct DeployPlan {
    /// Keys whose content differs from the cache (or everything, forced).
    pub uploads: Vec<String>,
    /// Keys whose content is unchanged.
    pub skips: Vec<String>,
}

/// Outcome of a deploy run.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failures: Vec<(String, String)>,
    pub dry_run: bool,
}

impl DeployReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

/// Walk the output directory and map each file to its storage key
/// (relative path with forward slashes) and content hash.
pub fn collect_output(output_dir: &Path) -> Result<BTreeMap<String, (PathBuf, String)>, DeployError> {
    if !output_dir.is_dir() {
        return Err(DeployError::MissingOutput(output_dir.to_path_buf()));
    }
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(output_dir) {
        let entry = entry.map_err(|e| DeployError::Io {
            path: output_dir.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let rel = path
            .strip_prefix(output_dir)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = fs::read(&path).map_err(|source| DeployError::Io {
            path: path.clone(),
            source,
        })?;
        files.insert(rel, (path, hash_bytes(&bytes)));
    }
    Ok(files)
}

/// Diff current hashes against the cache.
pub fn compute_plan(
    files: &BTreeMap<String, (PathBuf, String)>,
    cache: &DeployCache,
    force: bool,
) -> DeployPlan {
    let mut plan = DeployPlan::default();
    for (key, (_, hash)) in files {
        if !force && cache.hashes.get(key) == Some(hash) {
            plan.skips.push(key.clone());
        } else {
            plan.uploads.push(key.clone());
        }
    }
    plan
}

/// Remote keys with no corresponding output file.
pub fn orphaned_keys(
    remote: &[String],
    files: &BTreeMap<String, (PathBuf, String)>,
) -> Vec<String> {
    remote
        .iter()
        .filter(|key| !files.contains_key(key.as_str()))
        .cloned()
        .collect()
}

/// MIME type by extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("html" | "htm") => "text/html",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Sitemaps must update immediately; pages may cache for a day.
pub fn cache_control_for(key: &str, page_cache_secs: u64) -> String {
    if key.contains("sitemap") {
        "public, max-age=0, must-revalidate".to_string()
    } else {
        format!("public, max-age={page_cache_secs}")
    }
}

/// Run a deploy. See the module docs for the exact semantics of `dry_run`
/// and `force`.
pub async fn deploy(
    config: &SiteConfig,
    dry_run: bool,
    force: bool,
) -> Result<DeployReport, DeployError> {
    let output_dir = Path::new(&config.output_dir);
    let cache_path = Path::new(DEPLOY_CACHE_FILE);

    let files = collect_output(output_dir)?;
    let cache = if force {
        DeployCache::empty()
    } else {
        DeployCache::load(cache_path)
    };
    let plan = compute_plan(&files, &cache, force);

    let mut report = DeployReport {
        skipped: plan.skips.len(),
        dry_run,
        ..Default::default()
    };

    if dry_run {
        for key in &plan.uploads {
            println!("   [dry run] would upload {key}");
        }
        println!(
            "   [dry run] {} to upload, {} unchanged",
            plan.uploads.len(),
            plan.skips.len()
        );
        return Ok(report);
    }

    let store = ObjectStore::from_env(&config.storage.bucket)?;

    // Start from the old entries so failed uploads keep their previous
    // hash (and retry next run); drop keys that left the output set.
    let mut new_hashes = BTreeMap::new();
    for key in &plan.skips {
        if let Some(hash) = cache.hashes.get(key) {
            new_hashes.insert(key.clone(), hash.clone());
        }
    }

    for key in &plan.uploads {
        let (path, hash) = &files[key];
        let bytes = fs::read(path).map_err(|source| DeployError::Io {
            path: path.clone(),
            source,
        })?;
        let cache_control = cache_control_for(key, config.storage.page_cache_secs);
        match store
            .put(key, &bytes, content_type_for(key), &cache_control)
            .await
        {
            Ok(()) => {
                report.uploaded += 1;
                new_hashes.insert(key.clone(), hash.clone());
            }
            Err(e) => {
                eprintln!("   failed to upload {key}: {e}");
                report.failures.push((key.clone(), e.to_string()));
                if let Some(old) = cache.hashes.get(key) {
                    new_hashes.insert(key.clone(), old.clone());
                }
            }
        }
    }

    // Orphan cleanup: anything remote that no build output accounts for.
    match store.list_all().await {
        Ok(remote) => {
            for key in orphaned_keys(&remote, &files) {
                match store.delete(&key).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        eprintln!("   failed to delete orphan {key}: {e}");
                        report.failures.push((key, e.to_string()));
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("   failed to list bucket for orphan cleanup: {e}");
            report.failures.push(("(list)".to_string(), e.to_string()));
        }
    }

    let updated = DeployCache {
        version: CACHE_VERSION,
        last_build: Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        hashes: new_hashes,
    };
    updated.save(cache_path)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_output(dir: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    // =========================================================================
    // DeployCache load/save
    // =========================================================================

    #[test]
    fn cache_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEPLOY_CACHE_FILE);
        let mut cache = DeployCache::empty();
        cache
            .hashes
            .insert("glossary/data-lake/index.html".to_string(), "abc".to_string());
        cache.save(&path).unwrap();

        let loaded = DeployCache::load(&path);
        assert_eq!(loaded.hashes["glossary/data-lake/index.html"], "abc");
    }

    #[test]
    fn missing_cache_loads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(DeployCache::load(&tmp.path().join("nope.json")).hashes.is_empty());
    }

    #[test]
    fn corrupt_cache_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEPLOY_CACHE_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(DeployCache::load(&path).hashes.is_empty());
    }

    #[test]
    fn version_mismatch_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEPLOY_CACHE_FILE);
        let json = format!(
            r#"{{"version": {}, "hashes": {{"a": "b"}}}}"#,
            CACHE_VERSION + 1
        );
        fs::write(&path, json).unwrap();
        assert!(DeployCache::load(&path).hashes.is_empty());
    }

    // =========================================================================
    // Output collection
    // =========================================================================

    #[test]
    fn collect_output_uses_forward_slash_keys() {
        let tmp = TempDir::new().unwrap();
        write_output(
            tmp.path(),
            &[
                ("glossary/data-lake/index.html", "<html>"),
                ("sitemap-pseo-1.xml", "<urlset/>"),
            ],
        );
        let files = collect_output(tmp.path()).unwrap();
        assert!(files.contains_key("glossary/data-lake/index.html"));
        assert!(files.contains_key("sitemap-pseo-1.xml"));
    }

    #[test]
    fn missing_output_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            collect_output(&tmp.path().join("dist")),
            Err(DeployError::MissingOutput(_))
        ));
    }

    // =========================================================================
    // Plan computation (change detection)
    // =========================================================================

    #[test]
    fn unchanged_build_yields_empty_upload_set() {
        let tmp = TempDir::new().unwrap();
        write_output(tmp.path(), &[("a/index.html", "same"), ("b/index.html", "same2")]);
        let files = collect_output(tmp.path()).unwrap();

        // First deploy: everything uploads; cache records the hashes.
        let empty = DeployCache::empty();
        let first = compute_plan(&files, &empty, false);
        assert_eq!(first.uploads.len(), 2);

        let mut cache = DeployCache::empty();
        for (key, (_, hash)) in &files {
            cache.hashes.insert(key.clone(), hash.clone());
        }

        // Second build with no content change: nothing to upload.
        let files_again = collect_output(tmp.path()).unwrap();
        let second = compute_plan(&files_again, &cache, false);
        assert!(second.uploads.is_empty());
        assert_eq!(second.skips.len(), 2);
    }

    #[test]
    fn changed_file_is_replanned() {
        let tmp = TempDir::new().unwrap();
        write_output(tmp.path(), &[("a/index.html", "v1")]);
        let files = collect_output(tmp.path()).unwrap();
        let mut cache = DeployCache::empty();
        for (key, (_, hash)) in &files {
            cache.hashes.insert(key.clone(), hash.clone());
        }

        write_output(tmp.path(), &[("a/index.html", "v2")]);
        let changed = collect_output(tmp.path()).unwrap();
        let plan = compute_plan(&changed, &cache, false);
        assert_eq!(plan.uploads, vec!["a/index.html"]);
    }

    #[test]
    fn force_uploads_everything() {
        let tmp = TempDir::new().unwrap();
        write_output(tmp.path(), &[("a/index.html", "same")]);
        let files = collect_output(tmp.path()).unwrap();
        let mut cache = DeployCache::empty();
        for (key, (_, hash)) in &files {
            cache.hashes.insert(key.clone(), hash.clone());
        }
        let plan = compute_plan(&files, &cache, true);
        assert_eq!(plan.uploads.len(), 1);
        assert!(plan.skips.is_empty());
    }

    // =========================================================================
    // Orphans, content types, cache control
    // =========================================================================

    #[test]
    fn orphans_are_remote_minus_current() {
        let tmp = TempDir::new().unwrap();
        write_output(tmp.path(), &[("glossary/kept/index.html", "x")]);
        let files = collect_output(tmp.path()).unwrap();
        let remote = vec![
            "glossary/kept/index.html".to_string(),
            "glossary/removed/index.html".to_string(),
        ];
        assert_eq!(
            orphaned_keys(&remote, &files),
            vec!["glossary/removed/index.html"]
        );
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("glossary/x/index.html"), "text/html");
        assert_eq!(content_type_for("sitemap-pseo-1.xml"), "application/xml");
        assert_eq!(content_type_for("llm-sitemap.json"), "application/json");
        assert_eq!(content_type_for("key.txt"), "text/plain");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn sitemaps_are_never_cached() {
        assert_eq!(
            cache_control_for("sitemap-pseo-1.xml", 86_400),
            "public, max-age=0, must-revalidate"
        );
        assert_eq!(
            cache_control_for("glossary/x/index.html", 86_400),
            "public, max-age=86400"
        );
    }

    #[test]
    fn hash_bytes_is_sha256_hex() {
        let h = hash_bytes(b"hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_bytes(b"hello world"));
        assert_ne!(h, hash_bytes(b"hello worlds"));
    }
}
