//! End-to-end pipeline tests against a scripted in-process provider.
//!
//! These exercise the full run: scan → chunk → route → merge → layout →
//! manifest, without any network. The provider echoes `MARK:` lines from
//! the prompt so tests can see which chunk produced which part of a
//! document, and treats `POISON` in a prompt as a structural rejection on
//! every model.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use docweave::config::Config;
use docweave::events::NoopSink;
use docweave::generate::{run_generate, RunOptions};
use docweave::models::{FileStatus, RunMode};
use docweave::provider::{CallOutcome, ChatProvider, RateLimitHint};

struct FakeProvider {
    listing: Vec<String>,
    /// Models that structurally reject every request.
    broken_models: Vec<String>,
    calls: AtomicUsize,
    models_used: Mutex<Vec<String>>,
    /// Extra latency applied when the prompt contains the given marker.
    slow_marker: Option<(String, Duration)>,
}

impl FakeProvider {
    fn new(models: &[&str]) -> Self {
        Self {
            listing: models.iter().map(|s| s.to_string()).collect(),
            broken_models: Vec::new(),
            calls: AtomicUsize::new(0),
            models_used: Mutex::new(Vec::new()),
            slow_marker: None,
        }
    }

    fn with_broken_model(mut self, model: &str) -> Self {
        self.broken_models.push(model.to_string());
        self
    }

    fn with_slow_marker(mut self, marker: &str, delay: Duration) -> Self {
        self.slow_marker = Some((marker.to_string(), delay));
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn models_used(&self) -> Vec<String> {
        self.models_used.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for FakeProvider {
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.listing.clone())
    }

    async fn complete(&self, model: &str, prompt: &str) -> CallOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.broken_models.iter().any(|m| m == model) {
            return CallOutcome::Structural("model unavailable for this tier".into());
        }
        if prompt.contains("POISON") {
            return CallOutcome::Structural("request rejected".into());
        }

        if let Some((marker, delay)) = &self.slow_marker {
            if prompt.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        self.models_used.lock().unwrap().push(model.to_string());

        // Echo marker lines so tests can trace chunk content into output.
        let markers: Vec<&str> = prompt
            .lines()
            .filter(|l| l.trim_start().starts_with("MARK:"))
            .collect();
        let text = if markers.is_empty() {
            format!("## Documentation\n\nGenerated by {}.", model)
        } else {
            markers
                .iter()
                .map(|m| format!("## Section {}\n\nexplained.", m.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        CallOutcome::Success {
            text,
            hint: RateLimitHint::default(),
        }
    }
}

struct TestTree {
    _tmp: TempDir,
    src_root: PathBuf,
    output_root: PathBuf,
    config: Config,
}

fn setup(max_chars: usize, max_concurrency: usize) -> TestTree {
    let tmp = TempDir::new().unwrap();
    let src_root = tmp.path().join("project");
    let output_root = tmp.path().join("docs");
    fs::create_dir_all(&src_root).unwrap();

    let toml_text = format!(
        r#"
[scan]
root = "{src}"
include_extensions = ["rs", "py"]

[chunking]
max_chars = {max_chars}
overlap_lines = 2

[llm]
base_url = "http://localhost:0"
models = ["model-a", "model-b"]
validate_models = true

[llm.throttle]
enabled = false

[llm.retry]
max_attempts_per_model = 2
backoff_base_ms = 1
backoff_max_ms = 2

[output]
root = "{out}"

[run]
max_concurrency = {conc}
"#,
        src = src_root.display(),
        out = output_root.display(),
        max_chars = max_chars,
        conc = max_concurrency,
    );
    let config: Config = toml::from_str(&toml_text).unwrap();

    TestTree {
        _tmp: tmp,
        src_root,
        output_root,
        config,
    }
}

fn write_file(tree: &TestTree, rel: &str, content: &str) {
    let path = tree.src_root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn doc_path(tree: &TestTree, rel: &str) -> PathBuf {
    let stem = Path::new(rel).with_extension("");
    tree.output_root
        .join("src")
        .join(format!("{}.md", stem.display()))
}

async fn run(tree: &TestTree, provider: Arc<FakeProvider>, mode: RunMode) -> docweave::models::RunSummary {
    run_generate(
        &tree.config,
        RunOptions {
            mode,
            only: Vec::new(),
        },
        provider,
        Box::new(NoopSink),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn generates_documents_manifest_and_index() {
    let tree = setup(10_000, 1);
    write_file(&tree, "lib.rs", "fn alpha() {}\n");
    write_file(&tree, "nested/util.py", "def beta(): pass\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;

    assert_eq!(summary.generated, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);

    assert!(doc_path(&tree, "lib.rs").exists());
    assert!(doc_path(&tree, "nested/util.py").exists());
    assert!(tree.output_root.join("INDEX.md").exists());
    assert!(tree
        .output_root
        .join(".docweave")
        .join("manifest.json")
        .exists());

    let index = fs::read_to_string(tree.output_root.join("INDEX.md")).unwrap();
    assert!(index.contains("lib.rs"));
    assert!(index.contains("nested/util.py"));

    // Single-chunk files: one provider call each.
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn unchanged_rerun_makes_zero_provider_calls() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");
    write_file(&tree, "b.rs", "fn b() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    run(&tree, Arc::clone(&provider), RunMode::Continue).await;
    let calls_after_first = provider.call_count();

    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.generated, 0);
    assert_eq!(provider.call_count(), calls_after_first);
}

#[tokio::test]
async fn one_byte_change_regenerates_exactly_that_file() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");
    write_file(&tree, "b.rs", "fn b() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    run(&tree, Arc::clone(&provider), RunMode::Continue).await;

    write_file(&tree, "b.rs", "fn b() {}!\n");
    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;

    assert_eq!(summary.generated, 1);
    assert_eq!(summary.skipped, 1);
    let regenerated = summary
        .reports
        .iter()
        .find(|r| r.status == FileStatus::Generated)
        .unwrap();
    assert_eq!(regenerated.rel_path, "b.rs");
}

#[tokio::test]
async fn from_scratch_ignores_cache_and_regenerates() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    run(&tree, Arc::clone(&provider), RunMode::Continue).await;
    let calls_after_first = provider.call_count();

    let summary = run(&tree, Arc::clone(&provider), RunMode::FromScratch).await;
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.skipped, 0);
    assert!(provider.call_count() > calls_after_first);
}

#[tokio::test]
async fn broken_first_model_falls_back_deterministically() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");
    write_file(&tree, "b.rs", "fn b() {}\n");
    write_file(&tree, "c.rs", "fn c() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]).with_broken_model("model-a"));
    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;

    assert_eq!(summary.generated, 3);
    // Every successful call was served by model-b, never model-a.
    let used = provider.models_used();
    assert!(!used.is_empty());
    assert!(used.iter().all(|m| m == "model-b"));
}

#[tokio::test]
async fn failed_chunk_fails_only_that_file() {
    let tree = setup(300, 1);

    // Three chunks; the POISON marker lands in a middle chunk.
    let mut big = String::new();
    for i in 0..10 {
        big.push_str(&format!("// filler line number {:03}\n", i));
    }
    big.push_str("// POISON\n");
    for i in 10..20 {
        big.push_str(&format!("// filler line number {:03}\n", i));
    }
    write_file(&tree, "bad.rs", &big);
    write_file(&tree, "good.rs", "fn fine() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;

    assert_eq!(summary.generated, 1);
    assert_eq!(summary.failed, 1);
    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "bad.rs");
    assert!(failures[0].1.contains("structural"));

    // No output document and no manifest entry for the failed file.
    assert!(!doc_path(&tree, "bad.rs").exists());
    assert!(doc_path(&tree, "good.rs").exists());
    let manifest = fs::read_to_string(
        tree.output_root.join(".docweave").join("manifest.json"),
    )
    .unwrap();
    assert!(!manifest.contains("bad.rs"));
    assert!(manifest.contains("good.rs"));

    // The failed file regenerates on the next run instead of being skipped.
    let summary2 = run(&tree, Arc::clone(&provider), RunMode::Continue).await;
    assert_eq!(summary2.skipped, 1);
    assert_eq!(summary2.failed, 1);
}

#[tokio::test]
async fn out_of_order_completion_still_merges_in_chunk_order() {
    let tree = setup(300, 4);

    // Two chunks with distinct markers; the first chunk's call is delayed so
    // chunk 1 finishes before chunk 0.
    let mut body = String::new();
    body.push_str("MARK:FIRST\n");
    for i in 0..12 {
        body.push_str(&format!("// padding line number {:03}\n", i));
    }
    body.push_str("MARK:SECOND\n");
    write_file(&tree, "wide.rs", &body);

    let provider = Arc::new(
        FakeProvider::new(&["model-a", "model-b"])
            .with_slow_marker("MARK:FIRST", Duration::from_millis(80)),
    );
    let summary = run(&tree, Arc::clone(&provider), RunMode::Continue).await;
    assert_eq!(summary.generated, 1);

    let doc = fs::read_to_string(doc_path(&tree, "wide.rs")).unwrap();
    let first = doc.find("MARK:FIRST").expect("first marker missing");
    let second = doc.find("MARK:SECOND").expect("second marker missing");
    assert!(first < second, "fragments merged out of chunk order:\n{}", doc);
}

#[tokio::test]
async fn only_filter_restricts_run() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");
    write_file(&tree, "b.rs", "fn b() {}\n");

    let provider = Arc::new(FakeProvider::new(&["model-a", "model-b"]));
    let summary = run_generate(
        &tree.config,
        RunOptions {
            mode: RunMode::Continue,
            only: vec!["a.rs".to_string()],
        },
        Arc::clone(&provider) as Arc<dyn ChatProvider>,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].rel_path, "a.rs");
}

#[tokio::test]
async fn no_available_models_is_fatal() {
    let tree = setup(10_000, 1);
    write_file(&tree, "a.rs", "fn a() {}\n");

    // Provider lists nothing the config asks for.
    let provider = Arc::new(FakeProvider::new(&["other-model"]));
    let result = run_generate(
        &tree.config,
        RunOptions::default(),
        provider,
        Box::new(NoopSink),
    )
    .await;
    assert!(result.is_err());
}
