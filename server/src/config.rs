//! Process configuration from environment variables.
//!
//! `main` loads `.env` (if present) before anything reads the environment.
//! Subsystems with their own knobs (`llm::config`, `storage`, `rate_limit`,
//! `services::email_auth`) parse their own variables with the helpers here.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_AI_MAX_TOKENS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// `max_tokens` sent with every LLM call.
    pub ai_max_tokens: u32,
}

impl ServerConfig {
    /// Read `DATABASE_URL` (required), `PORT` (default 3000),
    /// `DB_MAX_CONNECTIONS` (default 5) and `AI_MAX_TOKENS` (default 1024).
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is unset or `PORT` is not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self {
            database_url,
            port,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", crate::db::DEFAULT_DB_MAX_CONNECTIONS),
            ai_max_tokens: env_parse("AI_MAX_TOKENS", DEFAULT_AI_MAX_TOKENS),
        })
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Read a boolean env var. Accepts `1/true/yes/on` and `0/false/no/off`.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Read a non-empty string env var.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
