//! Template registry: schema validation at creation time, newest-first
//! listing. Templates are immutable once created and the recognized field
//! type set is checked only here, so later changes to it never retroactively
//! invalidate stored templates.

use std::collections::HashSet;

use crate::db::{DbPool, FieldDef, FieldDefInput, FieldType, Template, TemplateResponse};
use crate::events::{Event, EventBus};

use super::EngineError;

/// Check a wire-format schema and convert it into typed field descriptors.
pub fn validate_schema(
    title: &str,
    schema: &[FieldDefInput],
) -> Result<Vec<FieldDef>, EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::InvalidSchema("title is required".to_string()));
    }
    if schema.is_empty() {
        return Err(EngineError::InvalidSchema(
            "schema must contain at least one field".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(schema.len());
    for field in schema {
        if field.label.trim().is_empty() {
            return Err(EngineError::InvalidSchema(
                "field labels must not be empty".to_string(),
            ));
        }
        if !seen.insert(field.label.as_str()) {
            return Err(EngineError::InvalidSchema(format!(
                "duplicate field label '{}'",
                field.label
            )));
        }
        let field_type: FieldType = field.field_type.parse().map_err(|_| {
            EngineError::InvalidSchema(format!(
                "unrecognized field type '{}' for '{}'",
                field.field_type, field.label
            ))
        })?;
        fields.push(FieldDef {
            label: field.label.clone(),
            field_type,
        });
    }

    Ok(fields)
}

/// Create a template from a validated schema and announce it.
pub async fn create_template(
    pool: &DbPool,
    events: &EventBus,
    title: &str,
    schema: &[FieldDefInput],
) -> Result<TemplateResponse, EngineError> {
    let fields = validate_schema(title, schema)?;

    let id = uuid::Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    let schema_json =
        serde_json::to_string(&fields).map_err(|e| EngineError::InvalidSchema(e.to_string()))?;

    sqlx::query("INSERT INTO templates (id, title, schema, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(title)
        .bind(&schema_json)
        .bind(&created_at)
        .execute(pool)
        .await?;

    tracing::info!("Created template '{}' ({})", title, id);
    events.publish(Event::TemplateCreated);

    Ok(TemplateResponse {
        id,
        title: title.to_string(),
        schema: fields,
        created_at,
    })
}

/// List all templates, newest first.
pub async fn list_templates(pool: &DbPool) -> Result<Vec<TemplateResponse>, EngineError> {
    let rows: Vec<Template> =
        sqlx::query_as("SELECT * FROM templates ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;

    let mut templates = Vec::with_capacity(rows.len());
    for row in rows {
        let schema = row.parse_schema().map_err(|e| {
            tracing::error!("Corrupt schema for template {}: {}", row.id, e);
            EngineError::InvalidSchema("stored schema is not valid".to_string())
        })?;
        templates.push(TemplateResponse {
            id: row.id,
            title: row.title,
            schema,
            created_at: row.created_at,
        });
    }

    Ok(templates)
}

/// Fetch one template with its parsed schema.
pub async fn get_template(
    pool: &DbPool,
    template_id: &str,
) -> Result<(Template, Vec<FieldDef>), EngineError> {
    let template: Template = sqlx::query_as("SELECT * FROM templates WHERE id = ?")
        .bind(template_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::UnknownTemplate)?;

    let schema = template.parse_schema().map_err(|e| {
        tracing::error!("Corrupt schema for template {}: {}", template.id, e);
        EngineError::InvalidSchema("stored schema is not valid".to_string())
    })?;

    Ok((template, schema))
}
