//! Headless client for the `FixDesk` REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `net` wraps the HTTP surface (`ChatApi`, `IssueApi`, `ServerApi`) over a
//! shared [`net::HttpClient`] that carries the bearer token and the sign-out
//! hook. `state` holds the client-side diagnosis wizard, the chat store it
//! owns, and the follow-up question flow. The CLI drives both.

pub mod net;
pub mod state;
