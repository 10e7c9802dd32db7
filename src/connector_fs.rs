//! Directory scanner for `ctxmem ingest-dir` and `ctxmem ingest`.
//!
//! Turns text files into [`Document`]s. A file's document id is derived
//! from its path relative to the scan root, so re-running a scan replaces
//! the earlier documents instead of duplicating them.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use context_memory_core::chunk::content_hash;
use context_memory_core::models::{Document, DocumentSource};

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

/// Scan `root` for matching files, sorted by relative path.
///
/// Files that are not valid UTF-8 are skipped.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<Document>> {
    if !root.is_dir() {
        bail!("Directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&options.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).follow_links(options.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match file_to_document(path, &rel_str)? {
            Some(document) => documents.push(document),
            None => debug!(path = %rel_str, "skipping non-UTF-8 file"),
        }
    }

    documents.sort_by(|a, b| a.source.path.cmp(&b.source.path));
    Ok(documents)
}

/// Load a single file as a document keyed by `id_path`.
///
/// Returns `None` when the file is not valid UTF-8.
pub fn file_to_document(path: &Path, id_path: &str) -> Result<Option<Document>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let Ok(content) = String::from_utf8(bytes) else {
        return Ok(None);
    };

    let modified_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let document = Document::with_id(file_document_id(id_path), content)
        .with_metadata("title", serde_json::json!(title))
        .with_metadata("type", serde_json::json!("file"))
        .with_source(DocumentSource {
            source_type: "file".to_string(),
            path: Some(id_path.to_string()),
            modified_at,
        });
    Ok(Some(document))
}

/// Stable document id for a file path.
pub fn file_document_id(path: &str) -> String {
    let hash = content_hash(&format!("file:{path}"));
    format!("file-{}", &hash[..32])
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
