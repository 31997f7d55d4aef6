//! Chat sessions and their append-only message log.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Lifecycle of a chat session.
    SessionStatus: "session status" {
        Active => "active",
        Diagnosing => "diagnosing",
        Resolved => "resolved",
        Closed => "closed",
    }
}

string_enum! {
    /// Author class of a chat message.
    MessageKind: "message type" {
        User => "user",
        System => "system",
        Assistant => "assistant",
    }
}

/// Server-side conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    /// Free-form JSON object. The server keeps `equipment_id` and
    /// `description` here as the diagnosis progresses.
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

impl Session {
    /// Equipment currently attached to the session, if any.
    #[must_use]
    pub fn equipment_id(&self) -> Option<Uuid> {
        self.metadata
            .get("equipment_id")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// One entry in a session's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub created_at: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
