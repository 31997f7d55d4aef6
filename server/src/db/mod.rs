//! Database initialization and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup creates the shared SQLx pool here and applies the embedded
//! migrations before the router accepts traffic.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

/// Decode a string-enum column, surfacing unknown values as a decode error.
///
/// # Errors
///
/// Returns `sqlx::Error::Decode` when the stored text names no variant.
pub fn parse_enum<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = records::UnknownVariant>,
{
    raw.parse::<T>().map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl crate::error::ErrorCode for sqlx::Error {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PoolTimedOut | Self::PoolClosed => "E_DB_UNAVAILABLE",
            _ => "E_DATABASE",
        }
    }

    fn status(&self) -> axum::http::StatusCode {
        match self {
            Self::PoolTimedOut | Self::PoolClosed => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::PoolTimedOut)
    }
}
