use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Daily self-reported check-in. Scores are 1-10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub mood: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub stress: Option<f64>,
    #[serde(default)]
    pub sleep_quality: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn at(created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            mood: None,
            energy: None,
            stress: None,
            sleep_quality: None,
            notes: None,
            created_at,
        }
    }
}
