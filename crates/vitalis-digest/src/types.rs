use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    Personal,
    Org,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestRequest {
    pub mode: DigestMode,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub organisation_id: Option<String>,
}

/// Week-over-week movement of a metric average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Stable,
    /// Readings this week, none the week before
    NoBaseline,
    /// Readings the week before, none this week
    NoRecentData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub metric_type: String,
    pub label: String,
    pub this_week_avg: Option<f64>,
    pub previous_week_avg: Option<f64>,
    pub change_pct: Option<f64>,
    pub direction: Direction,
    pub readings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub title: String,
    pub metric_type: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub progress_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub summary: String,
    pub highlights: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: NarrativeSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub mode: DigestMode,
    pub subject_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<usize>,
    pub metrics: Vec<MetricTrend>,
    pub goals: Vec<GoalProgress>,
    pub check_in_count: usize,
    pub narrative: Narrative,
}
