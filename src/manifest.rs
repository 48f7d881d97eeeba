//! Persistent manifest of generated documentation.
//!
//! Maps each file's relative path to the content hash it was last generated
//! from, so an unchanged file is skipped on the next continue-mode run. The
//! manifest is a JSON file written atomically (temp file + rename); an entry
//! is only recorded after the file's document has been durably written, so
//! the cache can never claim a half-generated file is current.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::RunMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub hash: String,
    /// Model that produced the final document.
    pub model: String,
    pub status: String,
    pub run_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestData {
    files: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    data: ManifestData,
}

impl Manifest {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: ManifestData::default(),
        }
    }

    /// Load from disk; a missing file is an empty manifest.
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(path));
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let data: ManifestData =
            serde_json::from_str(&content).with_context(|| "Failed to parse manifest")?;
        Ok(Self { path, data })
    }

    /// Write atomically: serialize to a sibling temp file, then rename over
    /// the manifest so a crash never leaves a torn file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Last recorded content hash for a file, if any.
    pub fn lookup(&self, rel_path: &str) -> Option<&str> {
        self.data.files.get(rel_path).map(|e| e.hash.as_str())
    }

    pub fn record(&mut self, rel_path: &str, entry: ManifestEntry) {
        self.data.files.insert(rel_path.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.data.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.files.is_empty()
    }

    /// Full reset: forget every entry and remove the file on disk.
    pub fn reset(&mut self) -> Result<()> {
        self.data.files.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The skip decision for one file, made explicit so it is testable on its
/// own: only a continue-mode run with a matching recorded hash skips.
pub fn should_skip(current_hash: &str, recorded_hash: Option<&str>, mode: RunMode) -> bool {
    match mode {
        RunMode::FromScratch => false,
        RunMode::Continue => recorded_hash == Some(current_hash),
    }
}
