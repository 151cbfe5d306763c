//! API handlers for form templates.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{CreateTemplateRequest, TemplateResponse, User};
use crate::engine::templates;
use crate::AppState;

use super::auth::require_admin;
use super::error::ApiError;

/// Create a template (admin only)
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiError> {
    require_admin(&user)?;

    let template =
        templates::create_template(&state.db, &state.events, &request.title, &request.schema)
            .await?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// List all templates, newest first (any authenticated caller)
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    _user: User,
) -> Result<Json<Vec<TemplateResponse>>, ApiError> {
    let templates = templates::list_templates(&state.db).await?;
    Ok(Json(templates))
}
