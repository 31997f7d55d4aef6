//! Shared record model for the `FixDesk` REST surface.
//!
//! This crate owns the JSON representation used by both `server` and
//! `client`. Every struct here is exactly what travels over the wire; the
//! server maps database rows into these types and the client decodes them
//! straight from response bodies.
//!
//! Timestamps are milliseconds since the Unix epoch (`i64`), ids are UUIDs.

/// Declares a string-backed enum with `as_str`, `FromStr`, `Display` and a
/// serde representation using the same strings.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $kind:literal { $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err($crate::UnknownVariant { kind: $kind, value: raw.to_owned() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod catalog;
pub mod chat;
pub mod diagnosis;
pub mod input;
pub mod service;

pub use catalog::{Business, Employee, EmployeeRole, Equipment, EquipmentMatch, EquipmentStatus};
pub use chat::{Message, MessageKind, Session, SessionStatus};
pub use diagnosis::{
    AiDiagnosis, DiagnosisKind, DiagnosisResult, EnhancedDescription, FollowUpAnswer, FollowUpQuestions, IssueMatch,
    Severity,
};
pub use service::{
    Issue, IssuePriority, IssueStatus, Problem, ResolvedBy, Solution, Technician, TechnicianReview,
};

use serde::{Deserialize, Serialize};

/// Minimum length (after trimming) of a user-written problem description.
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// Maximum accepted upload size in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Result of a successful upload to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub key: String,
    pub url: String,
}

/// Error body returned by every non-2xx server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default)]
    pub retryable: bool,
}

/// Authenticated user as returned by `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
}

/// Response to a successful access-code verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignIn {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
