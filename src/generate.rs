//! Run orchestration.
//!
//! Drives every scanned file through chunking, routed generation, merge,
//! output layout, and the manifest, under a global bound on simultaneously
//! in-flight provider calls. Files are independent: one file failing leaves
//! the rest of the run untouched, and a failed file gets no output document
//! and no manifest entry.
//!
//! Per-file states: pending → skipped (cache hit) | chunking → generating →
//! merging → done | failed. Every transition is surfaced to the caller's
//! [`EventSink`].

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

use crate::chunk::chunk_lines;
use crate::config::Config;
use crate::events::{EventSink, RunEvent};
use crate::layout::{self, OutputLayout};
use crate::limiter::{RateLimiter, ThrottleConfig};
use crate::manifest::{self, Manifest, ManifestEntry};
use crate::merge::merge_fragments;
use crate::models::{FileReport, FileStatus, Fragment, RunMode, RunSummary, SourceFile};
use crate::prompt::{self, PromptContext, PromptSettings};
use crate::provider::ChatProvider;
use crate::router::{ModelRouter, RoutingPolicy};
use crate::scanner;

/// Options for one run, resolved from CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Restrict the run to these relative paths when non-empty.
    pub only: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Continue,
            only: Vec::new(),
        }
    }
}

/// Everything a file task needs, shared across the run.
struct RunContext {
    router: ModelRouter,
    models: Vec<String>,
    call_slots: Semaphore,
    manifest: Mutex<Manifest>,
    sink: Box<dyn EventSink>,
    prompt: PromptSettings,
    output_root: PathBuf,
    layout: OutputLayout,
    max_chars: usize,
    overlap_lines: usize,
    mode: RunMode,
    run_id: String,
}

/// Execute one documentation run and return its aggregate summary.
///
/// Fatal configuration problems (malformed chunk bounds, no available
/// candidate model, unreadable scan root) return `Err` before any file is
/// processed; per-file failures are reported in the summary instead.
pub async fn run_generate(
    config: &Config,
    options: RunOptions,
    provider: Arc<dyn ChatProvider>,
    sink: Box<dyn EventSink>,
) -> Result<RunSummary> {
    crate::config::validate(config)?;
    let layout = OutputLayout::parse(&config.output.layout)?;

    let state_dir = config.state_dir();
    let manifest_path = state_dir.join("manifest.json");

    if options.mode == RunMode::FromScratch {
        layout::remove_generated(&config.output.root)?;
        let mut stale = Manifest::load(manifest_path.clone())?;
        stale.reset()?;
    }

    let files = scanner::scan_tree(&config.scan)?;
    let files = scanner::filter_only(files, &options.only);

    let limiter = Arc::new(RateLimiter::new(ThrottleConfig::from_settings(
        &config.llm.throttle,
    )));
    let policy = RoutingPolicy::from_config(&config.llm);
    let router = ModelRouter::new(provider, policy.clone(), limiter);

    // Run-scoped availability check: doomed candidates are dropped once,
    // never re-queried per chunk. An empty result is fatal.
    let models = if config.llm.validate_models {
        router.validate_models().await?
    } else {
        policy.models.clone()
    };

    let run_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    let ctx = Arc::new(RunContext {
        router,
        models,
        call_slots: Semaphore::new(config.run.max_concurrency),
        manifest: Mutex::new(Manifest::load(manifest_path)?),
        sink,
        prompt: PromptSettings::from_config(&config.prompt)?,
        output_root: config.output.root.clone(),
        layout,
        max_chars: config.chunking.max_chars,
        overlap_lines: config.chunking.overlap_lines,
        mode: options.mode,
        run_id: run_id.clone(),
    });

    ctx.sink.emit(RunEvent::RunStarted {
        run_id: run_id.clone(),
        files: files.len(),
        models: ctx.models.clone(),
    });

    let mut tasks = JoinSet::new();
    for file in files {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { process_file(ctx, file).await });
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = tasks.join_next().await {
        let report = joined.context("file task panicked")?;
        summary.push(report);
    }
    summary.reports.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    if config.output.write_index {
        let entries: Vec<(String, PathBuf)> = summary
            .reports
            .iter()
            .filter(|r| r.status != FileStatus::Failed)
            .map(|r| {
                (
                    r.rel_path.clone(),
                    layout::doc_path_for(&r.rel_path, &ctx.output_root, ctx.layout),
                )
            })
            .collect();
        layout::write_index(&config.output.root, &entries)?;
    }

    ctx.sink.emit(RunEvent::RunFinished {
        run_id,
        generated: summary.generated,
        skipped: summary.skipped,
        failed: summary.failed,
        duration: started.elapsed(),
    });

    Ok(summary)
}

/// Drive one file to a terminal state. Never returns `Err`: any failure is
/// folded into a `Failed` report so the rest of the run continues.
async fn process_file(ctx: Arc<RunContext>, file: SourceFile) -> FileReport {
    let rel_path = file.rel_path.clone();

    {
        let manifest = ctx.manifest.lock().await;
        let doc_path = layout::doc_path_for(&rel_path, &ctx.output_root, ctx.layout);
        if manifest::should_skip(&file.hash, manifest.lookup(&rel_path), ctx.mode)
            && doc_path.exists()
        {
            ctx.sink.emit(RunEvent::FileSkipped {
                rel_path: rel_path.clone(),
            });
            return FileReport {
                rel_path,
                status: FileStatus::Skipped,
                error: None,
            };
        }
    }

    match generate_file(&ctx, &file).await {
        Ok(model) => {
            tracing::debug!(rel_path = %rel_path, model = %model, "file documented");
            FileReport {
                rel_path,
                status: FileStatus::Generated,
                error: None,
            }
        }
        Err(e) => {
            let error = format!("{:#}", e);
            tracing::error!(rel_path = %rel_path, error = %error, "file failed");
            ctx.sink.emit(RunEvent::FileFailed {
                rel_path: rel_path.clone(),
                error: error.clone(),
            });
            FileReport {
                rel_path,
                status: FileStatus::Failed,
                error: Some(error),
            }
        }
    }
}

/// chunking → generating → merging → done for one file. Returns the model
/// that produced the final document.
async fn generate_file(ctx: &Arc<RunContext>, file: &SourceFile) -> Result<String> {
    let file_started = Instant::now();

    let chunks = chunk_lines(&file.body, ctx.max_chars, ctx.overlap_lines)?;
    let chunk_total = chunks.len();

    ctx.sink.emit(RunEvent::FileStarted {
        rel_path: file.rel_path.clone(),
        chunks: chunk_total,
    });

    // One future per chunk; the semaphore bounds in-flight provider calls
    // across the whole run, and join_all returns fragments in chunk-index
    // order regardless of completion order.
    let calls = chunks.iter().map(|chunk| {
        let ctx = Arc::clone(ctx);
        let rel_path = file.rel_path.clone();
        let ext = file.ext.clone();
        async move {
            let prompt_text = prompt::render(
                &ctx.prompt,
                &PromptContext {
                    rel_path: &rel_path,
                    ext: &ext,
                    chunk: chunk.index,
                    chunk_total,
                    code: &chunk.text,
                },
            );

            ctx.sink.emit(RunEvent::ChunkStarted {
                rel_path: rel_path.clone(),
                chunk: chunk.index,
                chunk_total,
            });

            let _slot = ctx
                .call_slots
                .acquire()
                .await
                .context("call semaphore closed")?;
            let chunk_started = Instant::now();
            let (text, model) = ctx
                .router
                .generate(&prompt_text, &ctx.models)
                .await
                .with_context(|| format!("chunk {}/{}", chunk.index + 1, chunk_total))?;
            let duration = chunk_started.elapsed();

            ctx.sink.emit(RunEvent::ChunkFinished {
                rel_path,
                chunk: chunk.index,
                chunk_total,
                model: model.clone(),
                duration,
            });

            Ok::<Fragment, anyhow::Error>(Fragment {
                chunk_index: chunk.index,
                text,
                model,
                duration,
            })
        }
    });

    let fragments: Vec<Fragment> = join_all(calls)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_fragments(&fragments, chunk_total)?;
    if chunk_total > 1 {
        ctx.sink.emit(RunEvent::MergeFinished {
            rel_path: file.rel_path.clone(),
            parts: chunk_total,
            out_chars: merged.len(),
        });
    }

    let doc_path = layout::doc_path_for(&file.rel_path, &ctx.output_root, ctx.layout);
    layout::write_document(&doc_path, &merged)?;

    // The document is durably on disk; only now may the manifest claim it.
    let final_model = fragments
        .last()
        .map(|f| f.model.clone())
        .unwrap_or_default();
    {
        let mut manifest = ctx.manifest.lock().await;
        manifest.record(
            &file.rel_path,
            ManifestEntry {
                hash: file.hash.clone(),
                model: final_model.clone(),
                status: FileStatus::Generated.as_str().to_string(),
                run_id: ctx.run_id.clone(),
                updated_at: Utc::now(),
            },
        );
        manifest.save()?;
    }

    ctx.sink.emit(RunEvent::FileFinished {
        rel_path: file.rel_path.clone(),
        model: final_model.clone(),
        duration: file_started.elapsed(),
    });

    Ok(final_model)
}

/// Validated candidate list without running generation (the `models`
/// subcommand).
pub async fn list_validated_models(
    config: &Config,
    provider: Arc<dyn ChatProvider>,
) -> Result<Vec<String>> {
    crate::config::validate(config)?;
    let limiter = Arc::new(RateLimiter::new(ThrottleConfig {
        enabled: false,
        min_interval: Duration::ZERO,
        min_remaining_tokens: 0,
    }));
    let policy = RoutingPolicy::from_config(&config.llm);
    let router = ModelRouter::new(provider, policy, limiter);
    router.validate_models().await
}
