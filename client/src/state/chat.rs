//! Chat session state owned by the diagnosis wizard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pure data container. The wizard writes into it as server responses
//! arrive; presentation code reads it to render the conversation.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use records::{DiagnosisResult, EnhancedDescription, Equipment, Message, Session};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ChatStore {
    pub session: Option<Session>,
    /// Message log in server order.
    pub messages: Vec<Message>,
    /// Equipment the conversation is about, once recognised or chosen.
    pub equipment: Option<Equipment>,
    pub enhancement: Option<EnhancedDescription>,
    pub diagnosis: Option<DiagnosisResult>,
}

impl ChatStore {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session: Some(session), ..Self::default() }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Selected equipment, falling back to the one recorded on the session.
    #[must_use]
    pub fn equipment_id(&self) -> Option<Uuid> {
        self.equipment
            .as_ref()
            .map(|e| e.id)
            .or_else(|| self.session.as_ref().and_then(Session::equipment_id))
    }

    /// Replace the log with a fresh server listing.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Append one message unless it is already in the log.
    pub fn push_message(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        self.messages.push(message);
    }

    /// Drop the enhancement and diagnosis but keep the session and equipment.
    pub fn clear_diagnosis(&mut self) {
        self.enhancement = None;
        self.diagnosis = None;
    }
}
