//! Provider API boundary.
//!
//! Defines the [`ChatProvider`] trait the router calls through, the closed
//! [`CallOutcome`] classification every response is reduced to, and
//! [`HttpProvider`], an implementation for OpenAI-compatible chat-completion
//! APIs (OpenAI, Groq, and friends).
//!
//! The router's correctness depends only on the outcome classification, not
//! on any wire format:
//! - 2xx → `Success` with the generated text and quota hints
//! - 429 → `RateLimited` with retry-after / reset hints from headers
//! - 400/401/403/404/422 and capacity rejections → `Structural`
//! - 5xx, timeouts, and transport errors → `Transient`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;

/// Rate-limit hints carried on provider responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHint {
    /// `retry-after` header, when present.
    pub retry_after: Option<Duration>,
    /// Time until the token quota window resets.
    pub reset_in: Option<Duration>,
    /// Remaining token budget in the current window.
    pub remaining_tokens: Option<u64>,
}

/// Classified result of one provider call.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Success { text: String, hint: RateLimitHint },
    RateLimited(RateLimitHint),
    Structural(String),
    Transient(String),
}

impl CallOutcome {
    /// Short class tag used in events and failure reports.
    pub fn class(&self) -> &'static str {
        match self {
            CallOutcome::Success { .. } => "success",
            CallOutcome::RateLimited(_) => "rate_limited",
            CallOutcome::Structural(_) => "structural",
            CallOutcome::Transient(_) => "transient",
        }
    }
}

/// One inference backend: a model listing plus a prompt-in, text-out call.
///
/// `complete` never returns `Err`; transport problems are part of the
/// [`CallOutcome`] taxonomy. `list_models` may fail, which the caller treats
/// as a run-fatal configuration problem.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Models the provider currently serves.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Issue one completion request for `prompt` against `model`.
    async fn complete(&self, model: &str, prompt: &str) -> CallOutcome;
}

/// OpenAI-compatible HTTP provider.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    temperature: f64,
    max_completion_tokens: u32,
}

impl HttpProvider {
    /// Build from config. Reads the API key from the configured environment
    /// variable; a missing key is a configuration error.
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if api_key.is_empty() {
            bail!("{} environment variable not set", cfg.api_key_env);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: cfg.temperature,
            max_completion_tokens: cfg.max_completion_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for HttpProvider {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Model listing failed with {}: {}", status, body);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Invalid model listing response")?;
        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .context("Model listing response missing data array")?;

        Ok(data
            .iter()
            .filter_map(|m| m.get("id").and_then(|id| id.as_str()))
            .map(|id| id.to_string())
            .collect())
    }

    async fn complete(&self, model: &str, prompt: &str) -> CallOutcome {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_completion_tokens": self.max_completion_tokens,
            "stream": false,
        });

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            // Connect errors and timeouts classify the same way: retryable.
            Err(e) => return CallOutcome::Transient(format!("transport error: {}", e)),
        };

        let status = response.status();
        let hint = hint_from_headers(response.headers());

        if status.is_success() {
            let json: serde_json::Value = match response.json().await {
                Ok(j) => j,
                Err(e) => return CallOutcome::Transient(format!("invalid response body: {}", e)),
            };
            return match extract_completion_text(&json) {
                Some(text) => CallOutcome::Success { text, hint },
                None => {
                    CallOutcome::Structural("response missing choices[0].message.content".into())
                }
            };
        }

        if status.as_u16() == 429 {
            return CallOutcome::RateLimited(hint);
        }

        let body_text = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            return CallOutcome::Transient(format!("server error {}: {}", status, body_text));
        }

        // Capacity/tier rejections (Groq uses 498 for flex capacity) and the
        // 4xx family: retrying the same model cannot succeed.
        CallOutcome::Structural(format!("status {}: {}", status, body_text))
    }
}

fn extract_completion_text(json: &serde_json::Value) -> Option<String> {
    json.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

/// Pull rate-limit hints out of response headers.
///
/// Understands `retry-after` (seconds or duration string) and the
/// `x-ratelimit-remaining-tokens` / `x-ratelimit-reset-tokens` pair.
pub fn hint_from_headers(headers: &reqwest::header::HeaderMap) -> RateLimitHint {
    let get = |key: &str| {
        headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    RateLimitHint {
        retry_after: get("retry-after").as_deref().and_then(parse_duration),
        reset_in: get("x-ratelimit-reset-tokens")
            .as_deref()
            .and_then(parse_duration),
        remaining_tokens: get("x-ratelimit-remaining-tokens")
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|f| f.max(0.0) as u64),
    }
}

/// Parse provider duration strings like `"7.66s"`, `"2m59.56s"`, `"1h5m"`,
/// or a bare number of seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return None;
    }

    if let Ok(secs) = v.parse::<f64>() {
        return positive_secs(secs);
    }

    let mut total = 0.0f64;
    let mut num = String::new();
    for ch in v.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            num.push(ch);
            continue;
        }
        let scale = match ch {
            'h' => 3600.0,
            'm' => 60.0,
            's' => 1.0,
            _ => return None,
        };
        let n: f64 = num.parse().ok()?;
        total += n * scale;
        num.clear();
    }
    if !num.is_empty() {
        // Trailing number without a unit is malformed.
        return None;
    }
    positive_secs(total)
}

fn positive_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 && secs.is_finite() {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
