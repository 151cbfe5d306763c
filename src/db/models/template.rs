//! Form template models.
//!
//! A template's schema is an ordered list of field descriptors, stored as JSON
//! in the `schema` column and re-parsed on read. Templates are immutable once
//! created; submissions reference them by id.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// The set of field types a template may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    Number,
    Textarea,
    Star,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Star => "star",
        }
    }
}

impl FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldType::Text),
            "date" => Ok(FieldType::Date),
            "number" => Ok(FieldType::Number),
            "textarea" => Ok(FieldType::Textarea),
            "star" => Ok(FieldType::Star),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field descriptor within a template's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// A field descriptor as it arrives on the wire, before the type string has
/// been checked against the recognized set.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefInput {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: String,
    pub title: String,
    pub schema: String,
    pub created_at: String,
}

impl Template {
    /// Parse the stored schema JSON back into ordered field descriptors.
    pub fn parse_schema(&self) -> Result<Vec<FieldDef>, serde_json::Error> {
        serde_json::from_str(&self.schema)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResponse {
    pub id: String,
    pub title: String,
    pub schema: Vec<FieldDef>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: String,
    pub schema: Vec<FieldDefInput>,
}
