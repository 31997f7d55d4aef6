//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Every field is cheap to clone: the pool and limiter are handles, and the
//! model and object store sit behind `Arc`s.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::llm::LlmChat;
use crate::rate_limit::RateLimiter;
use crate::services::email_auth::EmailConfig;
use crate::storage::{LocalFiles, ObjectStore, Storage};

const DEFAULT_AI_MAX_TOKENS: u32 = 1024;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Optional LLM client. `None` if LLM env vars are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
    /// In-memory rate limiter for AI requests.
    pub rate_limiter: RateLimiter,
    /// `max_tokens` for each model call, also the limiter's estimate.
    pub ai_max_tokens: u32,
    pub store: Arc<dyn ObjectStore>,
    /// Set for the local backend, which the router serves under `/files`.
    pub files: Option<LocalFiles>,
    pub url_ttl: Duration,
    /// Resend settings. `None` logs access codes instead of mailing them.
    pub email: Option<Arc<EmailConfig>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, llm: Option<Arc<dyn LlmChat>>, storage: Storage) -> Self {
        Self {
            pool,
            llm,
            rate_limiter: RateLimiter::default(),
            ai_max_tokens: DEFAULT_AI_MAX_TOKENS,
            store: storage.store,
            files: storage.files,
            url_ttl: storage.url_ttl,
            email: None,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_ai_max_tokens(mut self, max_tokens: u32) -> Self {
        self.ai_max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<EmailConfig>) -> Self {
        self.email = email.map(Arc::new);
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
