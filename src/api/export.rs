//! CSV report download.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::db::User;
use crate::engine::export::{export_csv, ExportKind};
use crate::AppState;

use super::auth::require_admin;
use super::error::ApiError;

/// Download a CSV report. `kind` is `user` (caller's own rows) or `admin`
/// (everything, with a submitter column; admin role required).
pub async fn export(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(kind): Path<String>,
) -> Result<Response, ApiError> {
    let kind: ExportKind = kind
        .parse()
        .map_err(|_| ApiError::forbidden("Unknown export kind"))?;

    if kind == ExportKind::Admin {
        require_admin(&user)?;
    }

    let csv = export_csv(&state.db, kind, &user).await?;

    let response = match csv {
        Some(body) => {
            let filename = match kind {
                ExportKind::User => "user_report.csv",
                ExportKind::Admin => "admin_report.csv",
            };
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={}", filename),
                    ),
                ],
                body,
            )
                .into_response()
        }
        // Sentinel rather than a header-only file
        None => "No data to export".into_response(),
    };

    Ok(response)
}
