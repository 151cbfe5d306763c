//! Review comment model. Comments are append-only audit entries created as a
//! side effect of a status decision; they are never edited individually and
//! are removed only when their submission is deleted.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: String,
    pub submission_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}
