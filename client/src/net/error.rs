//! Error type shared by every REST call.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    BaseUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered 401. The sign-out hook has already run if this
    /// was the first 401 of the signed-in session.
    #[error("not signed in")]
    Unauthorized,
    #[error("{message}")]
    Api { status: u16, code: String, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(error) => error.status().map(|s| s.as_u16()),
            Self::BaseUrl(_) | Self::Decode(_) => None,
        }
    }

    /// Server error code (`E_…`), if the response carried one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Build an error from a non-2xx response body.
    ///
    /// Servers answer with an `ErrorBody`; anything else (proxies, plain
    /// text) is kept verbatim as the message.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        if let Ok(parsed) = serde_json::from_slice::<records::ErrorBody>(body) {
            return Self::Api { status: status.as_u16(), code: parsed.code, message: parsed.error };
        }
        let text = String::from_utf8_lossy(body).trim().to_owned();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_owned()
        } else {
            text
        };
        Self::Api { status: status.as_u16(), code: String::new(), message }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
