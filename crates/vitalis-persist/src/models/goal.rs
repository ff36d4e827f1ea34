use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Goal {
    /// Progress towards target in percent, clamped to 0..=100
    pub fn progress_pct(&self) -> Option<f64> {
        let target = self.target_value?;
        let current = self.current_value?;
        if target == 0.0 {
            return None;
        }
        Some((current / target * 100.0).clamp(0.0, 100.0))
    }
}
