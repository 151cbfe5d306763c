//! The review workflow core: template registry, submission lifecycle, and
//! tabular export. The API layer handles authentication and role checks and
//! delegates everything else here.

pub mod export;
pub mod submissions;
pub mod templates;

use thiserror::Error;

/// Errors produced by the workflow core. The API boundary maps each variant
/// onto a stable client-facing error code; storage internals are logged, never
/// surfaced.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("template not found")]
    UnknownTemplate,

    #[error("submission not found")]
    UnknownSubmission,

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid form data: {0}")]
    InvalidFormData(String),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
