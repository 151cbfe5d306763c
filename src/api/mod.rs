pub mod auth;
mod error;
mod export;
mod submissions;
mod templates;
mod ws;

pub use error::{ApiError, ErrorCode};

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Plain acknowledgement body for mutations that return nothing else.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Auth (register/login are public; the rest authenticate per-handler
        // through the User extractor)
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/session", get(auth::session))
        .route("/logout", post(auth::logout))
        // Templates
        .route("/templates", post(templates::create_template))
        .route("/templates", get(templates::list_templates))
        // Submissions
        .route("/submissions", post(submissions::submit))
        .route("/submissions/mine", get(submissions::list_mine))
        .route("/submissions/all", get(submissions::list_all))
        .route("/submissions/:id/status", put(submissions::update_status))
        .route("/submissions/:id", delete(submissions::delete_submission))
        // Export
        .route("/export/:kind", get(export::export))
        // Realtime events (auth handled in the handler via query param)
        .route("/events", get(ws::events_ws));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
