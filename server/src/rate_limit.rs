//! In-memory rate limiting for the AI endpoints.
//!
//! DESIGN
//! ======
//! Sliding windows of timestamps per user, plus one shared global window.
//! Three limits are enforced before any LLM call:
//! - Per-user: `RATE_LIMIT_PER_USER` requests per window (default 10/min)
//! - Global: `RATE_LIMIT_GLOBAL` LLM calls per window (default 30/min)
//! - Token budget: `RATE_LIMIT_TOKEN_BUDGET` tokens per user per hour
//!
//! The token budget is checked before a call (using an up-front estimate,
//! the request's `max_tokens`) and settled afterwards with the real usage.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use uuid::Uuid;

use crate::config::env_parse;
use crate::error::ErrorCode;

const DEFAULT_PER_USER_LIMIT: usize = 10;
const DEFAULT_PER_USER_WINDOW_SECS: u64 = 60;
const DEFAULT_GLOBAL_LIMIT: usize = 30;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;
const DEFAULT_TOKEN_BUDGET: u64 = 50_000;
const DEFAULT_TOKEN_WINDOW_SECS: u64 = 3600;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_user_limit: usize,
    pub per_user_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
    pub token_budget: u64,
    pub token_window: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            per_user_limit: env_parse("RATE_LIMIT_PER_USER", DEFAULT_PER_USER_LIMIT),
            per_user_window: Duration::from_secs(env_parse(
                "RATE_LIMIT_PER_USER_WINDOW_SECS",
                DEFAULT_PER_USER_WINDOW_SECS,
            )),
            global_limit: env_parse("RATE_LIMIT_GLOBAL", DEFAULT_GLOBAL_LIMIT),
            global_window: Duration::from_secs(env_parse("RATE_LIMIT_GLOBAL_WINDOW_SECS", DEFAULT_GLOBAL_WINDOW_SECS)),
            token_budget: env_parse("RATE_LIMIT_TOKEN_BUDGET", DEFAULT_TOKEN_BUDGET),
            token_window: Duration::from_secs(env_parse("RATE_LIMIT_TOKEN_WINDOW_SECS", DEFAULT_TOKEN_WINDOW_SECS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_user_limit: DEFAULT_PER_USER_LIMIT,
            per_user_window: Duration::from_secs(DEFAULT_PER_USER_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
            token_budget: DEFAULT_TOKEN_BUDGET,
            token_window: Duration::from_secs(DEFAULT_TOKEN_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("too many AI requests (max {limit} per {window_secs}s)")]
    PerUser { limit: usize, window_secs: u64 },
    #[error("AI service is busy (max {limit} calls per {window_secs}s)")]
    Global { limit: usize, window_secs: u64 },
    #[error("AI token budget exhausted (max {budget} tokens per {window_secs}s)")]
    TokenBudget { budget: u64, window_secs: u64 },
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PerUser { .. } => "E_RATE_LIMITED",
            Self::Global { .. } => "E_RATE_LIMITED_GLOBAL",
            Self::TokenBudget { .. } => "E_TOKEN_BUDGET",
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Windows>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct Windows {
    per_user: HashMap<Uuid, VecDeque<Instant>>,
    global: VecDeque<Instant>,
    /// Settled usage: (timestamp, tokens).
    tokens: HashMap<Uuid, VecDeque<(Instant, u64)>>,
    /// Estimates for calls still in flight.
    reserved: HashMap<Uuid, u64>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(Windows::default())), config }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    /// Admit one AI request for `user_id` and reserve `estimate` tokens.
    ///
    /// # Errors
    ///
    /// Returns the first limit that would be exceeded. Nothing is recorded
    /// when the request is refused.
    pub fn admit(&self, user_id: Uuid, estimate: u64) -> Result<(), RateLimitError> {
        self.admit_at(user_id, estimate, Instant::now())
    }

    fn admit_at(&self, user_id: Uuid, estimate: u64, now: Instant) -> Result<(), RateLimitError> {
        let cfg = self.config;
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        prune(&mut w.global, now, cfg.global_window);
        if w.global.len() >= cfg.global_limit {
            return Err(RateLimitError::Global { limit: cfg.global_limit, window_secs: cfg.global_window.as_secs() });
        }

        let user_requests = w.per_user.entry(user_id).or_default();
        prune(user_requests, now, cfg.per_user_window);
        if user_requests.len() >= cfg.per_user_limit {
            return Err(RateLimitError::PerUser {
                limit: cfg.per_user_limit,
                window_secs: cfg.per_user_window.as_secs(),
            });
        }

        let used = {
            let usage = w.tokens.entry(user_id).or_default();
            prune_usage(usage, now, cfg.token_window);
            usage.iter().map(|(_, t)| *t).sum::<u64>()
        };
        let in_flight = w.reserved.get(&user_id).copied().unwrap_or(0);
        let projected = used.saturating_add(in_flight).saturating_add(estimate);
        if used >= cfg.token_budget || projected > cfg.token_budget {
            return Err(RateLimitError::TokenBudget {
                budget: cfg.token_budget,
                window_secs: cfg.token_window.as_secs(),
            });
        }

        w.global.push_back(now);
        w.per_user.entry(user_id).or_default().push_back(now);
        *w.reserved.entry(user_id).or_default() += estimate;
        Ok(())
    }

    /// Replace the reservation made by [`admit`](Self::admit) with real usage.
    pub fn settle(&self, user_id: Uuid, estimate: u64, used: u64) {
        self.settle_at(user_id, estimate, used, Instant::now());
    }

    fn settle_at(&self, user_id: Uuid, estimate: u64, used: u64, now: Instant) {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        release(&mut w.reserved, user_id, estimate);
        if used > 0 {
            w.tokens.entry(user_id).or_default().push_back((now, used));
        }
    }

    /// Drop the reservation of a call that failed before reporting usage.
    pub fn release(&self, user_id: Uuid, estimate: u64) {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        release(&mut w.reserved, user_id, estimate);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while deque.front().is_some_and(|&t| now.duration_since(t) > window) {
        deque.pop_front();
    }
}

fn prune_usage(deque: &mut VecDeque<(Instant, u64)>, now: Instant, window: Duration) {
    while deque.front().is_some_and(|&(t, _)| now.duration_since(t) > window) {
        deque.pop_front();
    }
}

fn release(reserved: &mut HashMap<Uuid, u64>, user_id: Uuid, amount: u64) {
    if let Some(slot) = reserved.get_mut(&user_id) {
        *slot = slot.saturating_sub(amount);
        if *slot == 0 {
            reserved.remove(&user_id);
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
