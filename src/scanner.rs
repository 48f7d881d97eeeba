//! Source tree scanner.
//!
//! Walks the configured scan root, keeps files whose extension is in the
//! include list and whose path matches no exclude glob, and produces the
//! ordered [`SourceFile`] set for a run. Bodies are secret-redacted before
//! hashing so neither the hash, the prompts, nor the generated docs ever
//! carry an API key that leaked into the tree.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::models::SourceFile;

/// Scan the tree and return files sorted by relative path.
pub fn scan_tree(config: &ScanConfig) -> Result<Vec<SourceFile>> {
    let root = &config.root;
    if !root.exists() {
        bail!("scan root does not exist: {}", root.display());
    }

    let exclude_set = build_globset(&config.exclude_globs)?;
    let include_exts: Vec<String> = config
        .include_extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !include_exts.iter().any(|i| *i == ext) {
            continue;
        }

        files.push(read_source_file(path, &rel_str, &ext)?);
    }

    // Deterministic ordering for reproducible runs.
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    Ok(files)
}

/// Restrict a scanned set to specific relative paths (`--only`).
pub fn filter_only(files: Vec<SourceFile>, only: &[String]) -> Vec<SourceFile> {
    if only.is_empty() {
        return files;
    }
    let wanted: Vec<String> = only
        .iter()
        .map(|p| p.trim_start_matches('/').replace('\\', "/"))
        .collect();
    files
        .into_iter()
        .filter(|f| wanted.iter().any(|w| *w == f.rel_path))
        .collect()
}

fn read_source_file(path: &Path, rel_path: &str, ext: &str) -> Result<SourceFile> {
    // Lossy decode: a stray non-UTF-8 byte must not cost the rest of the
    // file's content.
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw = String::from_utf8_lossy(&raw);
    let body = redact_secrets(&raw);
    let hash = sha256_hex(&body);

    Ok(SourceFile {
        rel_path: rel_path.to_string(),
        body,
        ext: ext.to_string(),
        hash,
    })
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Replace API-key-shaped strings before the text goes anywhere near a
/// prompt or the output tree.
pub fn redact_secrets(text: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            // Groq and OpenAI style keys.
            Regex::new(r"\bgsk_[A-Za-z0-9]{20,}\b").unwrap(),
            Regex::new(r"\bsk-[A-Za-z0-9]{20,}\b").unwrap(),
            // JWT-shaped tokens.
            Regex::new(r"\beyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\b").unwrap(),
        ]
    });

    let mut out = text.to_string();
    for pattern in patterns {
        out = pattern.replace_all(&out, "<REDACTED_SECRET>").into_owned();
    }
    out
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
