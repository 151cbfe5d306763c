//! Submission lifecycle: validation against the referenced template's schema,
//! creation, status decisions with optional review comments, and deletion.
//!
//! Status decisions carry no current-state precondition: repeating a decision
//! on an already-decided submission overwrites the status in place. This
//! mirrors the idempotent-overwrite policy of the system this replaces and is
//! recorded as a deliberate choice in DESIGN.md.

use crate::db::{
    Comment, DbPool, FieldDef, FieldType, FieldValue, FormData, SubmissionDetail,
    SubmissionStatus, User,
};
use crate::events::{Event, EventBus};

use super::{templates, EngineError};

/// Validate raw form data against a template schema and produce typed values.
///
/// Every key must match a schema label; extra keys are rejected. A `star`
/// field must be an integer in [1,5], either as a JSON number or a numeric
/// string (HTML form inputs arrive as strings). All other field types accept
/// any string; `date` and `number` formats are not deep-validated, which is a
/// known gap rather than a feature.
pub fn validate_form_data(
    schema: &[FieldDef],
    data: &serde_json::Map<String, serde_json::Value>,
) -> Result<FormData, EngineError> {
    let mut validated = FormData::new();

    for (key, value) in data {
        let field = schema.iter().find(|f| &f.label == key).ok_or_else(|| {
            EngineError::InvalidFormData(format!("unknown field '{}'", key))
        })?;

        let typed = match field.field_type {
            FieldType::Star => {
                let rating = match value {
                    serde_json::Value::Number(n) => n.as_i64(),
                    serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                match rating {
                    Some(n) if (1..=5).contains(&n) => FieldValue::Star(n),
                    _ => {
                        return Err(EngineError::InvalidFormData(format!(
                            "field '{}' must be a star rating from 1 to 5",
                            key
                        )))
                    }
                }
            }
            _ => match value {
                serde_json::Value::String(s) => FieldValue::Text(s.clone()),
                _ => {
                    return Err(EngineError::InvalidFormData(format!(
                        "field '{}' must be a string",
                        key
                    )))
                }
            },
        };

        validated.insert(key.clone(), typed);
    }

    Ok(validated)
}

/// Create a submission in `Pending` state and announce it.
pub async fn submit(
    pool: &DbPool,
    events: &EventBus,
    user: &User,
    template_id: &str,
    form_data: &serde_json::Map<String, serde_json::Value>,
) -> Result<String, EngineError> {
    let (template, schema) = templates::get_template(pool, template_id).await?;
    let validated = validate_form_data(&schema, form_data)?;

    let id = uuid::Uuid::new_v4().to_string();
    let submitted_at = chrono::Utc::now().to_rfc3339();
    let data_json = serde_json::to_string(&validated)
        .map_err(|e| EngineError::InvalidFormData(e.to_string()))?;

    sqlx::query(
        "INSERT INTO submissions (id, user_id, template_id, form_data, status, submitted_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&template.id)
    .bind(&data_json)
    .bind(SubmissionStatus::Pending.as_str())
    .bind(&submitted_at)
    .execute(pool)
    .await?;

    tracing::info!(
        "User {} submitted {} against template '{}'",
        user.email,
        id,
        template.title
    );
    events.publish(Event::NewSubmission);

    Ok(id)
}

/// Joined row shared by the user-scoped and admin listings.
#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: String,
    user_id: String,
    template_id: String,
    form_data: String,
    status: String,
    submitted_at: String,
    form_title: String,
    form_schema: String,
    user_name: Option<String>,
    user_email: Option<String>,
}

async fn build_details(
    pool: &DbPool,
    rows: Vec<SubmissionRow>,
) -> Result<Vec<SubmissionDetail>, EngineError> {
    let mut details = Vec::with_capacity(rows.len());
    for row in rows {
        let form_schema: Vec<FieldDef> = serde_json::from_str(&row.form_schema).map_err(|e| {
            tracing::error!("Corrupt schema for template {}: {}", row.template_id, e);
            EngineError::InvalidSchema("stored schema is not valid".to_string())
        })?;
        let form_data: FormData = serde_json::from_str(&row.form_data).map_err(|e| {
            tracing::error!("Corrupt form data for submission {}: {}", row.id, e);
            EngineError::InvalidFormData("stored form data is not valid".to_string())
        })?;

        let comments: Vec<Comment> = sqlx::query_as(
            "SELECT * FROM comments WHERE submission_id = ? ORDER BY created_at ASC",
        )
        .bind(&row.id)
        .fetch_all(pool)
        .await?;

        details.push(SubmissionDetail {
            id: row.id,
            user_id: row.user_id,
            template_id: row.template_id,
            form_title: row.form_title,
            form_schema,
            form_data,
            status: row.status,
            submitted_at: row.submitted_at,
            user_name: row.user_name,
            user_email: row.user_email,
            comments,
        });
    }
    Ok(details)
}

/// List one user's submissions, newest first, enriched with template title,
/// schema, and comment history.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<SubmissionDetail>, EngineError> {
    let rows: Vec<SubmissionRow> = sqlx::query_as(
        "SELECT s.id, s.user_id, s.template_id, s.form_data, s.status, s.submitted_at, \
                t.title AS form_title, t.schema AS form_schema, \
                NULL AS user_name, NULL AS user_email \
         FROM submissions s \
         JOIN templates t ON s.template_id = t.id \
         WHERE s.user_id = ? \
         ORDER BY s.submitted_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    build_details(pool, rows).await
}

/// List every submission across all users, newest first, with the submitter's
/// name and email attached.
pub async fn list_all(pool: &DbPool) -> Result<Vec<SubmissionDetail>, EngineError> {
    let rows: Vec<SubmissionRow> = sqlx::query_as(
        "SELECT s.id, s.user_id, s.template_id, s.form_data, s.status, s.submitted_at, \
                t.title AS form_title, t.schema AS form_schema, \
                u.name AS user_name, u.email AS user_email \
         FROM submissions s \
         JOIN users u ON s.user_id = u.id \
         JOIN templates t ON s.template_id = t.id \
         ORDER BY s.submitted_at DESC",
    )
    .fetch_all(pool)
    .await?;

    build_details(pool, rows).await
}

/// Record a review decision. The status write and the optional comment insert
/// happen in one transaction so a failure can never leave a decision without
/// its comment.
pub async fn update_status(
    pool: &DbPool,
    events: &EventBus,
    admin: &User,
    submission_id: &str,
    status: &str,
    comment: Option<&str>,
) -> Result<(), EngineError> {
    let decision: SubmissionStatus = status
        .parse()
        .ok()
        .filter(SubmissionStatus::is_decision)
        .ok_or_else(|| {
            EngineError::InvalidTransition(format!(
                "status must be 'Approved' or 'Rejected', got '{}'",
                status
            ))
        })?;

    let exists: Option<String> =
        sqlx::query_scalar("SELECT id FROM submissions WHERE id = ?")
            .bind(submission_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(EngineError::UnknownSubmission);
    }

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE submissions SET status = ? WHERE id = ?")
        .bind(decision.as_str())
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    if let Some(body) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        sqlx::query(
            "INSERT INTO comments (id, submission_id, author_name, body, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(submission_id)
        .bind(&admin.name)
        .bind(body)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Submission {} marked {} by {}",
        submission_id,
        decision,
        admin.email
    );
    events.publish(Event::StatusUpdated {
        submission_id: submission_id.to_string(),
        status: decision.as_str().to_string(),
    });

    Ok(())
}

/// Delete a submission and its comment history in one transaction.
pub async fn delete_submission(
    pool: &DbPool,
    events: &EventBus,
    submission_id: &str,
) -> Result<(), EngineError> {
    let exists: Option<String> =
        sqlx::query_scalar("SELECT id FROM submissions WHERE id = ?")
            .bind(submission_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(EngineError::UnknownSubmission);
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE submission_id = ?")
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM submissions WHERE id = ?")
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Submission {} deleted", submission_id);
    events.publish(Event::SubmissionDeleted {
        id: submission_id.to_string(),
    });

    Ok(())
}
