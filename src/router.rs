//! Ordered model fallback routing.
//!
//! The [`ModelRouter`] turns one prompt into one generated text by walking
//! an ordered candidate list. For each candidate it acquires a grant from
//! the shared [`RateLimiter`], issues the call, and acts on the classified
//! outcome:
//!
//! - `Success` → return immediately.
//! - `RateLimited` → feed the hint back into the limiter and retry the same
//!   model (the retry re-queues at the gate, so it waits out the cooldown).
//! - `Transient` → bounded retry on the same model with jittered exponential
//!   backoff.
//! - `Structural` → advance to the next candidate at once; retrying a model
//!   the provider structurally rejects cannot succeed.
//!
//! Candidate order never changes between calls, so fallback behavior is
//! reproducible. A run-scoped [`ModelRouter::validate_models`] pass filters
//! the list against the provider's live listing so doomed candidates are
//! never attempted.

use anyhow::{bail, Result};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::limiter::RateLimiter;
use crate::provider::{CallOutcome, ChatProvider};

/// Immutable routing parameters for a run.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// Candidate models in priority order.
    pub models: Vec<String>,
    /// Attempts per model before advancing (rate-limit and transient
    /// failures both consume attempts).
    pub max_attempts_per_model: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RoutingPolicy {
    pub fn from_config(llm: &crate::config::LlmConfig) -> Self {
        Self {
            models: llm.models.clone(),
            max_attempts_per_model: llm.retry.max_attempts_per_model,
            backoff_base: Duration::from_millis(llm.retry.backoff_base_ms),
            backoff_max: Duration::from_millis(llm.retry.backoff_max_ms),
        }
    }
}

pub struct ModelRouter {
    provider: Arc<dyn ChatProvider>,
    policy: RoutingPolicy,
    limiter: Arc<RateLimiter>,
}

impl ModelRouter {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        policy: RoutingPolicy,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            provider,
            policy,
            limiter,
        }
    }

    /// Filter the configured candidates down to models the provider
    /// currently lists, preserving priority order. Run once per run.
    ///
    /// An empty intersection means no file can be processed at all, which is
    /// fatal for the run.
    pub async fn validate_models(&self) -> Result<Vec<String>> {
        let available = self.provider.list_models().await?;
        let models: Vec<String> = self
            .policy
            .models
            .iter()
            .filter(|m| available.iter().any(|a| a == *m))
            .cloned()
            .collect();

        let missing: Vec<&String> = self
            .policy
            .models
            .iter()
            .filter(|m| !available.iter().any(|a| a == *m))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "configured models not offered by provider");
        }

        if models.is_empty() {
            bail!("none of the configured candidate models are available from the provider");
        }
        Ok(models)
    }

    /// Generate text for one prompt, falling back across `models` in order.
    ///
    /// Returns the generated text and the model that produced it, or an
    /// error describing the terminating class once every candidate is
    /// exhausted.
    pub async fn generate(&self, prompt: &str, models: &[String]) -> Result<(String, String)> {
        if models.is_empty() {
            bail!("no candidate models to route to");
        }

        let mut last_failure = String::from("no attempt made");

        for model in models {
            let mut attempt = 0u32;
            while attempt < self.policy.max_attempts_per_model {
                attempt += 1;

                self.limiter.acquire().await;
                let outcome = self.provider.complete(model, prompt).await;

                match outcome {
                    CallOutcome::Success { text, hint } => {
                        self.limiter
                            .on_success(hint.remaining_tokens, hint.reset_in)
                            .await;
                        return Ok((text, model.clone()));
                    }
                    CallOutcome::RateLimited(hint) => {
                        tracing::warn!(model = %model, attempt, "rate limited, will retry after cooldown");
                        self.limiter
                            .on_rate_limited(hint.retry_after, hint.reset_in)
                            .await;
                        last_failure = format!("rate_limited on {}", model);
                        // Next acquire() waits out the cooldown.
                    }
                    CallOutcome::Transient(msg) => {
                        tracing::warn!(model = %model, attempt, error = %msg, "transient failure");
                        last_failure = format!("transient on {}: {}", model, msg);
                        if attempt < self.policy.max_attempts_per_model {
                            tokio::time::sleep(self.backoff(attempt)).await;
                        }
                    }
                    CallOutcome::Structural(msg) => {
                        tracing::warn!(model = %model, error = %msg, "structural failure, advancing to next model");
                        last_failure = format!("structural on {}: {}", model, msg);
                        break;
                    }
                }
            }
        }

        bail!(
            "all candidate models exhausted; last failure: {}",
            last_failure
        )
    }

    /// Jittered exponential backoff for transient retries.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .policy
            .backoff_base
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let capped = base.min(self.policy.backoff_max);
        capped.mul_f64(0.7 + rand::thread_rng().gen_range(0.0..0.6))
    }
}
