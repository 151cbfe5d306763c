//! Submission models and the status state machine.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{Comment, FieldDef};

/// Lifecycle status of a submission. Every submission starts `Pending`; an
/// admin decision moves it to `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Approved => "Approved",
            SubmissionStatus::Rejected => "Rejected",
        }
    }

    /// Whether this status is a valid target for a review decision.
    pub fn is_decision(&self) -> bool {
        matches!(self, SubmissionStatus::Approved | SubmissionStatus::Rejected)
    }
}

impl FromStr for SubmissionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SubmissionStatus::Pending),
            "Approved" => Ok(SubmissionStatus::Approved),
            "Rejected" => Ok(SubmissionStatus::Rejected),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated form value, tagged by the declared field type so that
/// render and export code never has to sniff raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Star(i64),
    Text(String),
}

impl FieldValue {
    pub fn to_plain_string(&self) -> String {
        match self {
            FieldValue::Star(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

pub type FormData = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub form_data: String,
    pub status: String,
    pub submitted_at: String,
}

/// A submission enriched for client rendering: template title and schema,
/// chronological comment history, and (in admin listings) the submitter.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub form_title: String,
    pub form_schema: Vec<FieldDef>,
    pub form_data: FormData,
    pub status: String,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub template_id: String,
    pub form_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<SubmissionStatus>(), Ok(status));
        }
        assert!("pending".parse::<SubmissionStatus>().is_err());
        assert!("Denied".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_decision_targets() {
        assert!(!SubmissionStatus::Pending.is_decision());
        assert!(SubmissionStatus::Approved.is_decision());
        assert!(SubmissionStatus::Rejected.is_decision());
    }

    #[test]
    fn test_field_value_json() {
        let mut data = FormData::new();
        data.insert("Rating".to_string(), FieldValue::Star(4));
        data.insert("Notes".to_string(), FieldValue::Text("fine".to_string()));

        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"Notes":"fine","Rating":4}"#);

        let back: FormData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
