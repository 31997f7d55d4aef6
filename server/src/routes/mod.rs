//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every JSON endpoint lives under `/api`. When uploads go to the local
//! filesystem, the same router serves them back under `/files`, guarded by
//! the signed-URL check in [`uploads::verify_signed`].

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod service;
pub mod uploads;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, patch, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/chat/sessions", post(chat::create_session))
        .route("/api/chat/sessions/{id}", get(chat::get_session).patch(chat::update_session))
        .route(
            "/api/chat/sessions/{id}/messages",
            get(chat::list_messages).post(chat::append_message),
        )
        .route("/api/chat/sessions/{id}/equipment-search", post(chat::equipment_search))
        .route("/api/chat/sessions/{id}/enhance-description", post(chat::enhance_description))
        .route("/api/chat/sessions/{id}/followup-questions", post(chat::followup_questions))
        .route("/api/chat/sessions/{id}/diagnose", post(chat::diagnose))
        .route("/api/businesses", get(catalog::list_businesses).post(catalog::create_business))
        .route(
            "/api/businesses/{id}",
            get(catalog::get_business)
                .patch(catalog::update_business)
                .delete(catalog::delete_business),
        )
        .route(
            "/api/businesses/{id}/employees",
            get(catalog::list_employees).post(catalog::add_employee),
        )
        .route(
            "/api/employees/{id}",
            patch(catalog::update_employee).delete(catalog::delete_employee),
        )
        .route("/api/equipment", get(catalog::list_equipment).post(catalog::create_equipment))
        .route(
            "/api/equipment/{id}",
            get(catalog::get_equipment)
                .patch(catalog::update_equipment)
                .delete(catalog::delete_equipment),
        )
        .route("/api/problems", get(service::list_problems).post(service::create_problem))
        .route("/api/problems/{id}", get(service::get_problem).delete(service::delete_problem))
        .route(
            "/api/problems/{id}/solutions",
            get(service::list_solutions).post(service::add_solution),
        )
        .route(
            "/api/solutions/{id}",
            patch(service::update_solution).delete(service::delete_solution),
        )
        .route("/api/issues", get(service::list_issues).post(service::create_issue))
        .route(
            "/api/issues/{id}",
            get(service::get_issue)
                .patch(service::update_issue)
                .delete(service::delete_issue),
        )
        .route(
            "/api/technicians",
            get(service::list_technicians).post(service::create_technician),
        )
        .route(
            "/api/technicians/{id}",
            get(service::get_technician)
                .patch(service::update_technician)
                .delete(service::delete_technician),
        )
        .route(
            "/api/technicians/{id}/reviews",
            get(service::list_reviews).post(service::add_review),
        )
        .route(
            "/api/uploads",
            post(uploads::create_upload)
                .delete(uploads::delete_upload)
                .layer(DefaultBodyLimit::max(uploads::UPLOAD_BODY_LIMIT)),
        )
        .route("/api/uploads/url", get(uploads::download_url))
        .route("/healthz", get(healthz))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = api_routes().with_state(state.clone());
    if let Some(files) = state.files {
        let serve = Router::new()
            .nest_service("/files", ServeDir::new(&files.root))
            .layer(middleware::from_fn_with_state(files, uploads::verify_signed));
        router = router.merge(serve);
    }

    router
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
