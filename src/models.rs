//! Core data types used throughout docweave.
//!
//! These types represent the source files, chunks, and generated fragments
//! that flow through the documentation pipeline.

use std::time::Duration;

/// A source file produced by the scanner, immutable for the run.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the scan root, `/`-separated.
    pub rel_path: String,
    /// File body after secret redaction.
    pub body: String,
    /// Lowercased extension without the dot (e.g. `rs`, `py`), empty if none.
    pub ext: String,
    /// SHA-256 of the redacted body, hex-encoded.
    pub hash: String,
}

/// A bounded segment of one source file's text.
///
/// The first `overlap_lines` lines of `text` repeat the tail of the previous
/// chunk; dropping them from every chunk and concatenating what remains
/// reconstructs the original file exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based, contiguous sequence index within the file.
    pub index: usize,
    /// 0-based line number where this chunk starts (overlap included).
    pub start_line: usize,
    /// One past this chunk's last 0-based line number.
    pub end_line: usize,
    /// Number of leading lines shared with the previous chunk.
    pub overlap_lines: usize,
    pub text: String,
}

/// Generated text for exactly one chunk.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub chunk_index: usize,
    pub text: String,
    /// Model identifier that produced this fragment.
    pub model: String,
    pub duration: Duration,
}

/// How the run treats the manifest cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Skip files whose recorded hash matches the current content.
    Continue,
    /// Disregard the cache; regenerate everything.
    FromScratch,
}

/// Terminal state of one file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Cache hit, existing output reused without any model call.
    Skipped,
    /// Documentation generated and written.
    Generated,
    /// Processing aborted for this file; no output, no manifest entry.
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Skipped => "skipped",
            FileStatus::Generated => "generated",
            FileStatus::Failed => "failed",
        }
    }
}

/// Per-file outcome reported in the run summary.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub rel_path: String,
    pub status: FileStatus,
    /// Terminating error description for failed files.
    pub error: Option<String>,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub generated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: FileReport) {
        match report.status {
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Generated => self.generated += 1,
            FileStatus::Failed => self.failed += 1,
        }
        self.reports.push(report);
    }

    /// Failed files with their terminating error, sorted by path.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .reports
            .iter()
            .filter(|r| r.status == FileStatus::Failed)
            .map(|r| {
                (
                    r.rel_path.as_str(),
                    r.error.as_deref().unwrap_or("unknown error"),
                )
            })
            .collect();
        out.sort_by_key(|(path, _)| *path);
        out
    }
}
