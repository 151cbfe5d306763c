//! API handlers for the submission lifecycle.
//!
//! The user-scoped listing always uses the authenticated caller's id, never a
//! client-supplied one, so a user can only ever see their own submissions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{SubmissionDetail, SubmitRequest, UpdateStatusRequest, User};
use crate::engine::submissions;
use crate::AppState;

use super::auth::require_admin;
use super::error::ApiError;
use super::MessageResponse;

#[derive(Debug, serde::Serialize)]
pub struct SubmitResponse {
    pub id: String,
}

/// Submit a form against a template (any authenticated caller)
pub async fn submit(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let id = submissions::submit(
        &state.db,
        &state.events,
        &user,
        &request.template_id,
        &request.form_data,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { id })))
}

/// List the caller's own submissions
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<SubmissionDetail>>, ApiError> {
    let submissions = submissions::list_for_user(&state.db, &user.id).await?;
    Ok(Json(submissions))
}

/// List every submission across all users (admin only)
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<SubmissionDetail>>, ApiError> {
    require_admin(&user)?;
    let submissions = submissions::list_all(&state.db).await?;
    Ok(Json(submissions))
}

/// Record an approve/reject decision, with an optional review comment
/// (admin only)
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&user)?;

    submissions::update_status(
        &state.db,
        &state.events,
        &user,
        &id,
        &request.status,
        request.comment.as_deref(),
    )
    .await?;

    Ok(Json(MessageResponse::new("Status updated")))
}

/// Delete a submission and its comments (admin only)
pub async fn delete_submission(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&user)?;

    submissions::delete_submission(&state.db, &state.events, &id).await?;

    Ok(Json(MessageResponse::new("Submission deleted")))
}
