//! Chat session routes, including the diagnosis steps.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use records::input::{DiagnoseRequest, EnhanceRequest, EquipmentSearch, FollowUpRequest, NewMessage, SessionPatch};
use records::{DiagnosisResult, EnhancedDescription, EquipmentMatch, FollowUpQuestions, Message, Session};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::{ApiError, ApiJson};
use crate::services::{chat, diagnosis};
use crate::state::AppState;

pub async fn create_session(State(state): State<AppState>, auth: AuthUser) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = chat::create_session(&state.pool, auth.user.id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(chat::get_session(&state.pool, auth.user.id, id).await?))
}

pub async fn update_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<SessionPatch>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(chat::update_session(&state.pool, auth.user.id, id, patch).await?))
}

pub async fn append_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<NewMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = chat::append_message(&state.pool, auth.user.id, id, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(chat::list_messages(&state.pool, auth.user.id, id).await?))
}

pub async fn equipment_search(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<EquipmentSearch>,
) -> Result<Json<Vec<EquipmentMatch>>, ApiError> {
    Ok(Json(diagnosis::equipment_search(&state, &auth.user, id, body).await?))
}

pub async fn enhance_description(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<EnhanceRequest>,
) -> Result<Json<EnhancedDescription>, ApiError> {
    Ok(Json(diagnosis::enhance_description(&state, &auth.user, id, body).await?))
}

pub async fn followup_questions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<FollowUpRequest>,
) -> Result<Json<FollowUpQuestions>, ApiError> {
    Ok(Json(diagnosis::followup_questions(&state, &auth.user, id, body).await?))
}

pub async fn diagnose(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<DiagnoseRequest>,
) -> Result<Json<DiagnosisResult>, ApiError> {
    Ok(Json(diagnosis::diagnose(&state, &auth.user, id, body).await?))
}
