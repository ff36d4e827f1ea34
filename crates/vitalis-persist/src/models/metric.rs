use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored reading from a wearable or manual entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub metric_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl MetricReading {
    pub fn new(metric_type: impl Into<String>, value: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            metric_type: metric_type.into(),
            value,
            unit: None,
            recorded_at,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
