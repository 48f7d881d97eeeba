//! # docweave
//!
//! A chunking, rate-limit-aware documentation generator for source trees.
//!
//! docweave scans a project directory, splits each matching file into
//! bounded overlapping chunks, sends every chunk to an OpenAI-compatible
//! inference API through an ordered model-fallback router behind a shared
//! rate-limit gate, reassembles the per-chunk fragments into one Markdown
//! document per file, and keeps a manifest of content hashes so unchanged
//! files cost zero API calls on the next run.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌────────────────────┐   ┌───────┐
//! │ Scanner │──▶│ Chunker │──▶│ Router ▸ RateLimit │──▶│ Merge │
//! └─────────┘   └─────────┘   │  ▸ provider API    │   └───┬───┘
//!                             └────────────────────┘       │
//!                                  ┌───────────────────────┤
//!                                  ▼                       ▼
//!                            ┌──────────┐           ┌────────────┐
//!                            │ Manifest │           │ Output +   │
//!                            │  cache   │           │ INDEX.md   │
//!                            └──────────┘           └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Source tree scanning and redaction |
//! | [`chunk`] | Bounded, overlapping text chunking |
//! | [`limiter`] | Shared rate-limit gate |
//! | [`provider`] | Provider API boundary and HTTP client |
//! | [`router`] | Ordered model fallback routing |
//! | [`merge`] | Fragment reassembly |
//! | [`manifest`] | Skip-if-unchanged cache |
//! | [`prompt`] | Prompt template rendering |
//! | [`layout`] | Output tree layout |
//! | [`events`] | Run lifecycle events |
//! | [`generate`] | Run orchestration |

pub mod chunk;
pub mod config;
pub mod events;
pub mod generate;
pub mod layout;
pub mod limiter;
pub mod manifest;
pub mod merge;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod router;
pub mod scanner;
