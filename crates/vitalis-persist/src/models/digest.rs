use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored copy of a generated weekly digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// `user` or `organisation`
    pub subject_type: String,
    pub subject_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
