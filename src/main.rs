//! # docweave CLI
//!
//! Commands for generating, inspecting, and resetting a project's generated
//! documentation.
//!
//! ```bash
//! docweave --config ./docweave.toml generate
//! docweave --config ./docweave.toml generate --from-scratch
//! docweave --config ./docweave.toml generate --only src/lib.rs --only src/main.rs
//! docweave --config ./docweave.toml models
//! docweave --config ./docweave.toml reset
//! ```
//!
//! The API key is read from the environment variable named by
//! `llm.api_key_env` (default `DOCWEAVE_API_KEY`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docweave::config::load_config;
use docweave::events::EventMode;
use docweave::generate::{list_validated_models, run_generate, RunOptions};
use docweave::layout::remove_generated;
use docweave::manifest::Manifest;
use docweave::models::RunMode;
use docweave::provider::HttpProvider;

/// docweave — documentation generator for source trees.
///
/// All commands read a TOML configuration file; see `docweave.example.toml`
/// for the full set of options.
#[derive(Parser)]
#[command(
    name = "docweave",
    about = "Generate per-file Markdown documentation for a source tree via an LLM API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docweave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the documentation pipeline.
    ///
    /// Scans the source tree, skips files whose content hash matches the
    /// manifest, and generates one Markdown document per remaining file.
    /// Failed files are reported individually and never abort the run.
    Generate {
        /// Ignore the manifest and regenerate everything, clearing
        /// previously generated outputs first.
        #[arg(long)]
        from_scratch: bool,

        /// Only process these relative paths (repeatable).
        #[arg(long)]
        only: Vec<String>,

        /// Lifecycle event output: off, human, or json.
        /// Defaults to human on a TTY, json otherwise.
        #[arg(long)]
        events: Option<String>,
    },

    /// Print the candidate models the provider currently offers.
    ///
    /// Runs the same run-scoped availability check `generate` uses, without
    /// generating anything.
    Models,

    /// Delete the manifest and all generated outputs.
    ///
    /// Removes the mirrored `src/` subtree and `INDEX.md` under the output
    /// root plus the manifest; other files under the output root are kept.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Generate {
            from_scratch,
            only,
            events,
        } => {
            let mode = match events.as_deref() {
                None => EventMode::default_for_tty(),
                Some("off") => EventMode::Off,
                Some("human") => EventMode::Human,
                Some("json") => EventMode::Json,
                Some(other) => anyhow::bail!("Unknown event mode: {}", other),
            };

            let options = RunOptions {
                mode: if from_scratch {
                    RunMode::FromScratch
                } else {
                    RunMode::Continue
                },
                only,
            };

            let provider = Arc::new(HttpProvider::new(&config.llm)?);
            let summary = run_generate(&config, options, provider, mode.sink()).await?;

            println!(
                "generate: {} generated, {} skipped, {} failed",
                summary.generated, summary.skipped, summary.failed
            );
            for (rel_path, error) in summary.failures() {
                println!("  failed {}: {}", rel_path, error);
            }

            // A run that produced nothing at all is an error; partial
            // failure still counts as a completed run.
            let attempted = summary.generated + summary.failed;
            if summary.failed > 0 && attempted == summary.failed && attempted > 0 {
                anyhow::bail!("every attempted file failed");
            }
        }

        Commands::Models => {
            let provider = Arc::new(HttpProvider::new(&config.llm)?);
            for model in list_validated_models(&config, provider).await? {
                println!("{}", model);
            }
        }

        Commands::Reset => {
            remove_generated(&config.output.root)?;
            let mut manifest = Manifest::load(config.state_dir().join("manifest.json"))?;
            manifest.reset()?;
            println!("reset: manifest and generated outputs removed");
        }
    }

    Ok(())
}
