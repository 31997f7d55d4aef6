//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod catalog;
pub mod chat;
pub mod diagnosis;
pub mod email_auth;
pub mod issue;
pub mod matching;
pub mod problem;
pub mod session;
pub mod technician;
pub mod upload;
