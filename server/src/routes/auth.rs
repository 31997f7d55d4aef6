//! Auth routes: email access codes, session lookup, logout.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use records::input::{RequestCode, VerifyCode};
use records::{SignIn, User};
use time::Duration;
use tracing::info;

use crate::config::env_bool;
use crate::error::{ApiError, ApiJson};
use crate::services::{email_auth, session};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub(crate) fn cookie_secure() -> bool {
    env_bool("COOKIE_SECURE").unwrap_or(false)
}

fn session_cookie(token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cookie_secure())
        .max_age(max_age)
        .build()
}

/// Session token from `Authorization: Bearer …`, else the session cookie.
pub(crate) fn request_token(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(session::parse_bearer)
    {
        return Some(token.to_owned());
    }
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the bearer token or session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { user, token })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/email/request-code`: create and send an access code.
pub async fn request_email_code(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RequestCode>,
) -> Result<StatusCode, ApiError> {
    let (email, code) = email_auth::request_access_code(&state.pool, &body.email).await?;
    email_auth::deliver_access_code(state.email.as_deref(), &email, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/email/verify-code`: exchange a code for a session.
pub async fn verify_email_code(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<VerifyCode>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code).await?;
    let user = session::get_user(&state.pool, user_id)
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    let token = session::create_session(&state.pool, user.id).await?;
    info!(user_id = %user.id, "signed in with email code");

    let jar = jar.add(session_cookie(token.clone(), Duration::days(30)));
    Ok((jar, Json(SignIn { token, user })))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    session::delete_session(&state.pool, &auth.token).await?;
    let jar = CookieJar::new().add(session_cookie(String::new(), Duration::ZERO));
    Ok((jar, StatusCode::NO_CONTENT))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
