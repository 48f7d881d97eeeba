//! Shared rate-limit gate for outbound provider calls.
//!
//! One [`RateLimiter`] is shared by every in-flight call in a run. A grant
//! from [`RateLimiter::acquire`] is required before each request; the grant
//! enforces a minimum wall-clock interval between requests and honors
//! cooldowns learned from provider feedback (429 retry-after hints and
//! low-remaining-quota reports).
//!
//! All mutable state lives behind a single async mutex, so the
//! check-and-reserve of the next slot is atomic across callers. Callers that
//! find the gate closed sleep outside the lock and retry; grant order is
//! only approximately arrival order (a caller waking from its sleep races
//! the re-check with newer arrivals), but every caller is eventually served.
//! The limiter never rejects, it only delays.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Static throttle parameters, from `[llm.throttle]` config.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub min_interval: Duration,
    pub min_remaining_tokens: u64,
}

impl ThrottleConfig {
    pub fn from_settings(settings: &crate::config::ThrottleSettings) -> Self {
        Self {
            enabled: settings.enabled,
            min_interval: Duration::from_millis(settings.min_interval_ms),
            min_remaining_tokens: settings.min_remaining_tokens,
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    /// Earliest instant the next grant may be issued (interval pacing).
    next_allowed: Instant,
    /// Cooldown floor learned from provider feedback (429 / low quota).
    blocked_until: Instant,
}

/// Process-wide throttle shared across all files and chunks of a run.
pub struct RateLimiter {
    cfg: ThrottleConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(cfg: ThrottleConfig) -> Self {
        let now = Instant::now();
        Self {
            cfg,
            state: Mutex::new(LimiterState {
                next_allowed: now,
                blocked_until: now,
            }),
        }
    }

    /// Block until a request slot is available, then reserve the next one.
    pub async fn acquire(&self) {
        if !self.cfg.enabled {
            return;
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let target = state.next_allowed.max(state.blocked_until);
                if target <= now {
                    state.next_allowed = now + self.cfg.min_interval;
                    return;
                }
                target - now
            };
            // Sleep outside the critical section, then re-check: the cooldown
            // may have grown while we slept.
            tokio::time::sleep(wait).await;
        }
    }

    /// Feed back quota headers from a successful call. If the provider
    /// reports the remaining token budget below the configured floor, hold
    /// the next grant until the reported reset.
    pub async fn on_success(&self, remaining_tokens: Option<u64>, reset_in: Option<Duration>) {
        if !self.cfg.enabled {
            return;
        }

        if let (Some(remaining), Some(reset)) = (remaining_tokens, reset_in) {
            if remaining <= self.cfg.min_remaining_tokens {
                let hold = reset + jitter(Duration::from_millis(200), Duration::from_millis(500));
                tracing::warn!(
                    remaining_tokens = remaining,
                    hold_ms = hold.as_millis() as u64,
                    "token quota low, holding grants until reset"
                );
                let mut state = self.state.lock().await;
                state.blocked_until = state.blocked_until.max(Instant::now() + hold);
            }
        }
    }

    /// Feed back a provider "too many requests" signal. The next grant waits
    /// at least the hinted duration (retry-after or quota reset, whichever
    /// is longer), with a small jitter.
    pub async fn on_rate_limited(&self, retry_after: Option<Duration>, reset_in: Option<Duration>) {
        if !self.cfg.enabled {
            return;
        }

        let mut wait = Duration::ZERO;
        if let Some(ra) = retry_after {
            wait = wait.max(ra);
        }
        if let Some(reset) = reset_in {
            wait = wait.max(reset);
        }
        // The provider sometimes sends a bare 429 with no hint.
        if wait.is_zero() {
            wait = Duration::from_secs(3);
        }
        wait += jitter(Duration::from_millis(300), Duration::from_millis(700));

        tracing::warn!(
            wait_ms = wait.as_millis() as u64,
            "rate limited by provider, cooling down"
        );

        let mut state = self.state.lock().await;
        state.blocked_until = state.blocked_until.max(Instant::now() + wait);
    }
}

fn jitter(min: Duration, max: Duration) -> Duration {
    let span = max.saturating_sub(min);
    if span.is_zero() {
        return min;
    }
    min + Duration::from_millis(rand::thread_rng().gen_range(0..=span.as_millis() as u64))
}
