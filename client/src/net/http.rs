//! Shared HTTP transport for the REST facades.
//!
//! DESIGN
//! ======
//! One `HttpClient` is cloned into every facade so they share the bearer
//! token and the sign-out hook. The hook fires on the first 401 after a
//! sign-in and never again until the next [`HttpClient::sign_in`]; a burst
//! of concurrent requests failing with 401 therefore signs the user out
//! exactly once.
//!
//! There are no timeouts, retries or de-duplication here. Every failure is
//! handed back to the caller as a [`ClientError`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::ClientError;

/// Callback run when the server rejects the session token.
pub type SignOutHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    signed_in: AtomicBool,
    on_sign_out: RwLock<Option<SignOutHook>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url)
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client for `base_url` (scheme and host, no `/api` suffix).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BaseUrl`] when the URL is not `http(s)://…`, or
    /// a transport error if the TLS backend cannot be initialised.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/');
        let host = base_url.strip_prefix("http://").or_else(|| base_url.strip_prefix("https://"));
        if host.is_none_or(str::is_empty) {
            return Err(ClientError::BaseUrl(base_url.to_owned()));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("fixdesk-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.to_owned(),
                token: RwLock::new(None),
                signed_in: AtomicBool::new(false),
                on_sign_out: RwLock::new(None),
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Absolute URL for an API path such as `/api/issues`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    /// Start a signed-in session with `token`, re-arming the sign-out hook.
    pub fn sign_in(&self, token: impl Into<String>) {
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
        self.inner.signed_in.store(true, Ordering::Release);
    }

    /// Forget the token without running the sign-out hook.
    pub fn sign_out(&self) {
        self.inner.signed_in.store(false, Ordering::Release);
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.signed_in.load(Ordering::Acquire)
    }

    /// Register the callback run on the first 401 of a signed-in session.
    pub fn on_sign_out(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.inner.on_sign_out.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Handle a 401. Returns `true` if this call ended the session.
    pub(crate) fn expire_session(&self) -> bool {
        if !self.inner.signed_in.swap(false, Ordering::AcqRel) {
            return false;
        }
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        warn!(base_url = %self.inner.base_url, "session rejected by server; signing out");
        let hook = self.inner.on_sign_out.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Request builder with the bearer token attached, if any.
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.inner.http.request(method, self.url(path));
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send `builder` and decode a JSON response body.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, and undecodable bodies.
    pub async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let body = self.execute(builder).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send `builder` and discard the response body (204 endpoints).
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses.
    pub async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.execute(builder).await.map(|_| ())
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_owned();
        let body = response.bytes().await?.to_vec();
        debug!(%status, path = %url, bytes = body.len(), "response");

        if status == StatusCode::UNAUTHORIZED {
            self.expire_session();
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ClientError::from_response(status, &body));
        }
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Shorthands
    // -------------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::DELETE, path)).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).multipart(form)).await
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
