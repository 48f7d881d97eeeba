use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub scan: ScanConfig,
    pub chunking: ChunkingConfig,
    pub llm: LlmConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

fn default_include_extensions() -> Vec<String> {
    vec![
        "rs".to_string(),
        "py".to_string(),
        "ts".to_string(),
        "tsx".to_string(),
        "js".to_string(),
        "md".to_string(),
    ]
}

fn default_exclude_globs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters of source text sent in one model request.
    pub max_chars: usize,
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
}

fn default_overlap_lines() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API base, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Candidate models in fallback priority order.
    pub models: Vec<String>,
    /// Confirm candidates against the provider's model listing once per run.
    #[serde(default = "default_true")]
    pub validate_models: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub throttle: ThrottleSettings,
}

fn default_api_key_env() -> String {
    "DOCWEAVE_API_KEY".to_string()
}
fn default_true() -> bool {
    true
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_completion_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts_per_model")]
    pub max_attempts_per_model: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_model: default_max_attempts_per_model(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_max_attempts_per_model() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    800
}
fn default_backoff_max_ms() -> u64 {
    20_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Wait for the quota window to reset when the provider reports fewer
    /// remaining tokens than this.
    #[serde(default = "default_min_remaining_tokens")]
    pub min_remaining_tokens: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: default_min_interval_ms(),
            min_remaining_tokens: default_min_remaining_tokens(),
        }
    }
}

fn default_min_interval_ms() -> u64 {
    2200
}
fn default_min_remaining_tokens() -> u64 {
    800
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub root: PathBuf,
    /// `flat` writes `<parent>/<stem>.md`; `stem_folder` writes
    /// `<parent>/<stem>/<stem>.md`.
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default = "default_true")]
    pub write_index: bool,
}

fn default_layout() -> String {
    "flat".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Where the manifest lives. Defaults to `<output.root>/.docweave`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            state_dir: None,
        }
    }
}

fn default_max_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Optional template file overriding the built-in prompt.
    #[serde(default)]
    pub template_file: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            tone: default_tone(),
            template_file: None,
        }
    }
}

fn default_language() -> String {
    "English".to_string()
}
fn default_tone() -> String {
    "concise and technical".to_string()
}

impl Config {
    /// Resolved manifest/state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.run
            .state_dir
            .clone()
            .unwrap_or_else(|| self.output.root.join(".docweave"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations no file could ever be processed under.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.llm.models.is_empty() {
        anyhow::bail!("llm.models must list at least one candidate model");
    }

    if config.run.max_concurrency == 0 {
        anyhow::bail!("run.max_concurrency must be >= 1");
    }

    if config.llm.retry.max_attempts_per_model == 0 {
        anyhow::bail!("llm.retry.max_attempts_per_model must be >= 1");
    }

    match config.output.layout.as_str() {
        "flat" | "stem_folder" => {}
        other => anyhow::bail!(
            "Unknown output layout: '{}'. Must be flat or stem_folder.",
            other
        ),
    }

    Ok(())
}
