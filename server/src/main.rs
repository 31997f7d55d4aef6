mod config;
mod db;
mod error;
mod llm;
mod rate_limit;
mod routes;
mod services;
mod state;
mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::llm::LlmChat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::ServerConfig::from_env()?;
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    // Initialize LLM client (non-fatal: AI features disabled if config missing).
    let llm: Option<Arc<dyn LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; AI features disabled");
            None
        }
    };

    let storage = storage::Storage::from_config(storage::StorageConfig::from_env()?)?;
    if let Some(files) = &storage.files {
        tokio::fs::create_dir_all(&files.root).await?;
        tracing::info!(dir = %files.root.display(), "serving local uploads under /files");
    }

    let email = services::email_auth::EmailConfig::from_env();
    if email.is_none() {
        tracing::warn!("RESEND_API_KEY not set; access codes will be logged");
    }

    let state = state::AppState::new(pool, llm, storage)
        .with_rate_limiter(rate_limit::RateLimiter::from_env())
        .with_ai_max_tokens(config.ai_max_tokens)
        .with_email(email);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!(port = config.port, "fixdesk listening");
    axum::serve(listener, app).await?;
    Ok(())
}
