//! Run lifecycle events.
//!
//! The orchestrator emits one [`RunEvent`] per state transition at run,
//! file, chunk, and merge granularity. It only emits — sinks are owned by
//! the caller, and nothing in the core ever reads events back. Events are
//! written on **stderr** so stdout stays parseable for scripts.

use chrono::Utc;
use std::io::Write;
use std::time::Duration;

/// A single lifecycle event.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        files: usize,
        models: Vec<String>,
    },
    FileSkipped {
        rel_path: String,
    },
    FileStarted {
        rel_path: String,
        chunks: usize,
    },
    ChunkStarted {
        rel_path: String,
        chunk: usize,
        chunk_total: usize,
    },
    ChunkFinished {
        rel_path: String,
        chunk: usize,
        chunk_total: usize,
        model: String,
        duration: Duration,
    },
    MergeFinished {
        rel_path: String,
        parts: usize,
        out_chars: usize,
    },
    FileFinished {
        rel_path: String,
        model: String,
        duration: Duration,
    },
    FileFailed {
        rel_path: String,
        error: String,
    },
    RunFinished {
        run_id: String,
        generated: u64,
        skipped: u64,
        failed: u64,
        duration: Duration,
    },
}

/// Consumes lifecycle events. Implementations write to stderr (human or
/// JSON) or drop them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Human-friendly one-liners on stderr.
pub struct StderrSink;

impl EventSink for StderrSink {
    fn emit(&self, event: RunEvent) {
        let line = match &event {
            RunEvent::RunStarted {
                files, models, ..
            } => {
                format!("run started  {} files  models: {}\n", files, models.join(", "))
            }
            RunEvent::FileSkipped { rel_path } => format!("{}  skipped (unchanged)\n", rel_path),
            RunEvent::FileStarted { rel_path, chunks } => {
                format!("{}  generating ({} chunks)\n", rel_path, chunks)
            }
            RunEvent::ChunkStarted {
                rel_path,
                chunk,
                chunk_total,
            } => format!("{}  chunk {}/{}\n", rel_path, chunk + 1, chunk_total),
            RunEvent::ChunkFinished {
                rel_path,
                chunk,
                chunk_total,
                model,
                duration,
            } => format!(
                "{}  chunk {}/{} done  {}  {:.1}s\n",
                rel_path,
                chunk + 1,
                chunk_total,
                model,
                duration.as_secs_f64()
            ),
            RunEvent::MergeFinished {
                rel_path,
                parts,
                out_chars,
            } => format!("{}  merged {} parts  {} chars\n", rel_path, parts, out_chars),
            RunEvent::FileFinished {
                rel_path,
                model,
                duration,
            } => format!(
                "{}  done  {}  {:.1}s\n",
                rel_path,
                model,
                duration.as_secs_f64()
            ),
            RunEvent::FileFailed { rel_path, error } => {
                format!("{}  FAILED: {}\n", rel_path, error)
            }
            RunEvent::RunFinished {
                generated,
                skipped,
                failed,
                duration,
                ..
            } => format!(
                "run finished  {} generated, {} skipped, {} failed  {:.1}s\n",
                generated,
                skipped,
                failed,
                duration.as_secs_f64()
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable: one JSON object per line on stderr.
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: RunEvent) {
        let ts = Utc::now().to_rfc3339();
        let obj = match &event {
            RunEvent::RunStarted {
                run_id,
                files,
                models,
            } => serde_json::json!({
                "event": "run_started", "ts": ts, "run_id": run_id,
                "files": files, "models": models
            }),
            RunEvent::FileSkipped { rel_path } => serde_json::json!({
                "event": "file_skipped", "ts": ts, "rel_path": rel_path
            }),
            RunEvent::FileStarted { rel_path, chunks } => serde_json::json!({
                "event": "file_started", "ts": ts, "rel_path": rel_path, "chunks": chunks
            }),
            RunEvent::ChunkStarted {
                rel_path,
                chunk,
                chunk_total,
            } => serde_json::json!({
                "event": "chunk_started", "ts": ts, "rel_path": rel_path,
                "chunk": chunk, "chunk_total": chunk_total
            }),
            RunEvent::ChunkFinished {
                rel_path,
                chunk,
                chunk_total,
                model,
                duration,
            } => serde_json::json!({
                "event": "chunk_finished", "ts": ts, "rel_path": rel_path,
                "chunk": chunk, "chunk_total": chunk_total, "model": model,
                "duration_s": duration.as_secs_f64()
            }),
            RunEvent::MergeFinished {
                rel_path,
                parts,
                out_chars,
            } => serde_json::json!({
                "event": "merge_finished", "ts": ts, "rel_path": rel_path,
                "parts": parts, "out_chars": out_chars
            }),
            RunEvent::FileFinished {
                rel_path,
                model,
                duration,
            } => serde_json::json!({
                "event": "file_finished", "ts": ts, "rel_path": rel_path,
                "model": model, "duration_s": duration.as_secs_f64()
            }),
            RunEvent::FileFailed { rel_path, error } => serde_json::json!({
                "event": "file_failed", "ts": ts, "rel_path": rel_path, "error": error
            }),
            RunEvent::RunFinished {
                run_id,
                generated,
                skipped,
                failed,
                duration,
            } => serde_json::json!({
                "event": "run_finished", "ts": ts, "run_id": run_id,
                "generated": generated, "skipped": skipped, "failed": failed,
                "duration_s": duration.as_secs_f64()
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op sink when event output is disabled.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: RunEvent) {}
}

/// Event output mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventMode {
    Off,
    Human,
    Json,
}

impl EventMode {
    /// Default: human events when stderr is a TTY, otherwise JSON lines.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            EventMode::Human
        } else {
            EventMode::Json
        }
    }

    pub fn sink(&self) -> Box<dyn EventSink> {
        match self {
            EventMode::Off => Box::new(NoopSink),
            EventMode::Human => Box::new(StderrSink),
            EventMode::Json => Box::new(JsonSink),
        }
    }
}
