//! REST facades over the `FixDesk` server.
//!
//! ERROR HANDLING
//! ==============
//! Every facade method logs a failed call with `tracing::error!` and hands
//! the error back unchanged. Presentation code decides how to surface it.

pub mod chat_api;
pub mod error;
pub mod http;
pub mod issue_api;
pub mod server_api;

#[cfg(test)]
pub(crate) mod test_server;

pub use chat_api::ChatApi;
pub use error::ClientError;
pub use http::HttpClient;
pub use issue_api::{IssueApi, IssueQuery};
pub use server_api::{ProblemQuery, ServerApi};

/// Log a failed call under `op` and pass the result through.
pub(crate) fn logged<T>(op: &'static str, result: Result<T, ClientError>) -> Result<T, ClientError> {
    if let Err(error) = &result {
        tracing::error!(op, status = ?error.status(), %error, "api call failed");
    }
    result
}
