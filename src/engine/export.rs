//! CSV export: flattens submissions plus their dynamic form data into one
//! table. The dynamic column set is the union of keys across all exported
//! rows (in first-seen order), so rows from templates with different schemas
//! stay aligned under a single header.

use std::collections::HashSet;
use std::str::FromStr;

use crate::db::{DbPool, FormData, User};

use super::EngineError;

/// The two report shapes: a user's own rows, or everything with a submitter
/// column for admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    User,
    Admin,
}

impl FromStr for ExportKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ExportKind::User),
            "admin" => Ok(ExportKind::Admin),
            _ => Err(()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExportRow {
    id: String,
    title: String,
    form_data: String,
    status: String,
    submitted_at: String,
    user_name: Option<String>,
}

/// Quote a CSV cell, doubling any embedded quotes.
fn escape(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn build_csv(rows: &[ExportRow], include_user: bool) -> String {
    // Union of dynamic keys across all rows, in first-seen order
    let mut seen = HashSet::new();
    let mut dynamic_keys: Vec<String> = Vec::new();
    let parsed: Vec<FormData> = rows
        .iter()
        .map(|row| serde_json::from_str(&row.form_data).unwrap_or_default())
        .collect();
    for data in &parsed {
        for key in data.keys() {
            if seen.insert(key.clone()) {
                dynamic_keys.push(key.clone());
            }
        }
    }

    let mut header: Vec<String> = vec![
        "id".to_string(),
        "title".to_string(),
        "status".to_string(),
        "date".to_string(),
    ];
    header.extend(dynamic_keys.iter().cloned());
    if include_user {
        header.push("user".to_string());
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        header
            .iter()
            .map(|h| escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );

    for (row, data) in rows.iter().zip(&parsed) {
        let mut cells = vec![
            escape(&row.id),
            escape(&row.title),
            escape(&row.status),
            escape(&row.submitted_at),
        ];
        for key in &dynamic_keys {
            let value = data
                .get(key)
                .map(|v| v.to_plain_string())
                .unwrap_or_default();
            cells.push(escape(&value));
        }
        if include_user {
            cells.push(escape(row.user_name.as_deref().unwrap_or_default()));
        }
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

/// Render the requested report. Returns `None` when there are no rows; the
/// API layer sends a "no data" sentinel instead of a header-only file.
/// Role enforcement for the admin kind happens at the API boundary.
pub async fn export_csv(
    pool: &DbPool,
    kind: ExportKind,
    requester: &User,
) -> Result<Option<String>, EngineError> {
    let rows: Vec<ExportRow> = match kind {
        ExportKind::User => {
            sqlx::query_as(
                "SELECT s.id, t.title, s.form_data, s.status, s.submitted_at, \
                        NULL AS user_name \
                 FROM submissions s \
                 JOIN templates t ON s.template_id = t.id \
                 WHERE s.user_id = ? \
                 ORDER BY s.submitted_at DESC",
            )
            .bind(&requester.id)
            .fetch_all(pool)
            .await?
        }
        ExportKind::Admin => {
            sqlx::query_as(
                "SELECT s.id, t.title, s.form_data, s.status, s.submitted_at, \
                        u.name AS user_name \
                 FROM submissions s \
                 JOIN users u ON s.user_id = u.id \
                 JOIN templates t ON s.template_id = t.id \
                 ORDER BY s.submitted_at DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(build_csv(&rows, kind == ExportKind::Admin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FieldValue;

    fn row(id: &str, title: &str, data: &FormData, user_name: Option<&str>) -> ExportRow {
        ExportRow {
            id: id.to_string(),
            title: title.to_string(),
            form_data: serde_json::to_string(data).unwrap(),
            status: "Pending".to_string(),
            submitted_at: "2026-08-24T10:00:00+00:00".to_string(),
            user_name: user_name.map(str::to_string),
        }
    }

    fn data(pairs: &[(&str, FieldValue)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_escape_doubles_quotes() {
        assert_eq!(escape("plain"), "\"plain\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape(""), "\"\"");
        assert_eq!(escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_build_csv_user_shape() {
        let rows = vec![row(
            "s1",
            "Survey",
            &data(&[
                ("Dish", FieldValue::Text("Soup".to_string())),
                ("Rating", FieldValue::Star(4)),
            ]),
            None,
        )];
        let csv = build_csv(&rows, false);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "\"id\",\"title\",\"status\",\"date\",\"Dish\",\"Rating\"");
        assert_eq!(
            lines[1],
            "\"s1\",\"Survey\",\"Pending\",\"2026-08-24T10:00:00+00:00\",\"Soup\",\"4\""
        );
    }

    #[test]
    fn test_build_csv_header_is_union_of_keys() {
        let rows = vec![
            row(
                "s1",
                "Survey",
                &data(&[("Dish", FieldValue::Text("Soup".to_string()))]),
                Some("Ann"),
            ),
            row(
                "s2",
                "Feedback",
                &data(&[("Mood", FieldValue::Text("Good".to_string()))]),
                Some("Ben"),
            ),
        ];
        let csv = build_csv(&rows, true);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "\"id\",\"title\",\"status\",\"date\",\"Dish\",\"Mood\",\"user\""
        );
        // Keys a row lacks render as empty cells, keeping columns aligned
        assert!(lines[1].contains("\"Soup\",\"\""));
        assert!(lines[2].contains("\"\",\"Good\""));
        assert!(lines[1].ends_with("\"Ann\""));
        assert!(lines[2].ends_with("\"Ben\""));
    }

    #[tokio::test]
    async fn test_export_empty_returns_none() {
        let pool = crate::db::test_pool().await;
        let requester = User {
            id: "u1".to_string(),
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: "x".to_string(),
            role: "user".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let csv = export_csv(&pool, ExportKind::User, &requester).await.unwrap();
        assert!(csv.is_none());
    }

    #[tokio::test]
    async fn test_export_user_scoped_to_requester() {
        use crate::engine::{submissions, templates};
        use crate::events::EventBus;
        use serde_json::json;

        let pool = crate::db::test_pool().await;
        let events = EventBus::default();

        let mut users = Vec::new();
        for (name, email) in [("Ann", "ann@example.com"), ("Ben", "ben@example.com")] {
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: "x".to_string(),
                role: "user".to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, role, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(&user.created_at)
            .execute(&pool)
            .await
            .unwrap();
            users.push(user);
        }

        let template = templates::create_template(
            &pool,
            &events,
            "Survey",
            &[crate::db::FieldDefInput {
                label: "Dish".to_string(),
                field_type: "text".to_string(),
            }],
        )
        .await
        .unwrap();

        for (user, dish) in users.iter().zip(["Soup", "Pie"]) {
            let mut form = serde_json::Map::new();
            form.insert("Dish".to_string(), json!(dish));
            submissions::submit(&pool, &events, user, &template.id, &form)
                .await
                .unwrap();
        }

        let csv = export_csv(&pool, ExportKind::User, &users[0])
            .await
            .unwrap()
            .unwrap();
        assert!(csv.contains("\"Soup\""));
        assert!(!csv.contains("\"Pie\""));
        // User exports carry no submitter column
        assert!(!csv.contains("\"user\""));

        let csv = export_csv(&pool, ExportKind::Admin, &users[0])
            .await
            .unwrap()
            .unwrap();
        assert!(csv.contains("\"Soup\""));
        assert!(csv.contains("\"Pie\""));
        assert!(csv.contains("\"Ann\""));
        assert!(csv.contains("\"Ben\""));
    }
}
