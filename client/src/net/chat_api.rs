//! Chat sessions and the diagnosis endpoints hanging off them.

use records::input::{
    DiagnoseRequest, EnhanceRequest, EquipmentSearch, FollowUpRequest, NewMessage, SessionPatch,
};
use records::{
    DiagnosisResult, EnhancedDescription, EquipmentMatch, FollowUpAnswer, FollowUpQuestions, Message, MessageKind,
    Session, SessionStatus,
};
use reqwest::Method;
use uuid::Uuid;

use super::error::ClientError;
use super::http::HttpClient;
use super::logged;

fn session_path(id: Uuid) -> String {
    format!("/api/chat/sessions/{id}")
}

fn session_action_path(id: Uuid, action: &str) -> String {
    format!("/api/chat/sessions/{id}/{action}")
}

#[derive(Debug, Clone)]
pub struct ChatApi {
    http: HttpClient,
}

impl ChatApi {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn create_session(&self) -> Result<Session, ClientError> {
        let result = self.http.send(self.http.request(Method::POST, "/api/chat/sessions")).await;
        logged("create_session", result)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Session, ClientError> {
        logged("get_session", self.http.get(&session_path(id)).await)
    }

    pub async fn update_session(&self, id: Uuid, patch: &SessionPatch) -> Result<Session, ClientError> {
        logged("update_session", self.http.patch(&session_path(id), patch).await)
    }

    pub async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<Session, ClientError> {
        self.update_session(id, &SessionPatch { status: Some(status), metadata: None }).await
    }

    pub async fn send_message(&self, id: Uuid, content: &str, kind: MessageKind) -> Result<Message, ClientError> {
        let body = NewMessage { content: content.to_owned(), kind: Some(kind) };
        logged("send_message", self.http.post(&session_action_path(id, "messages"), &body).await)
    }

    pub async fn list_messages(&self, id: Uuid) -> Result<Vec<Message>, ClientError> {
        logged("list_messages", self.http.get(&session_action_path(id, "messages")).await)
    }

    pub async fn equipment_search(&self, id: Uuid, query: &str) -> Result<Vec<EquipmentMatch>, ClientError> {
        let body = EquipmentSearch { query: query.to_owned() };
        logged("equipment_search", self.http.post(&session_action_path(id, "equipment-search"), &body).await)
    }

    pub async fn enhance_description(&self, id: Uuid, description: &str) -> Result<EnhancedDescription, ClientError> {
        let body = EnhanceRequest { description: description.to_owned() };
        logged(
            "enhance_description",
            self.http.post(&session_action_path(id, "enhance-description"), &body).await,
        )
    }

    pub async fn followup_questions(
        &self,
        id: Uuid,
        description: &str,
        answers: &[FollowUpAnswer],
    ) -> Result<FollowUpQuestions, ClientError> {
        let body = FollowUpRequest { description: description.to_owned(), answers: answers.to_vec() };
        logged(
            "followup_questions",
            self.http.post(&session_action_path(id, "followup-questions"), &body).await,
        )
    }

    pub async fn diagnose(
        &self,
        id: Uuid,
        description: &str,
        equipment_id: Option<Uuid>,
    ) -> Result<DiagnosisResult, ClientError> {
        let body = DiagnoseRequest { description: description.to_owned(), equipment_id };
        logged("diagnose", self.http.post(&session_action_path(id, "diagnose"), &body).await)
    }
}

#[cfg(test)]
#[path = "chat_api_test.rs"]
mod tests;
