use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Assessment, CheckIn, Device, DigestRecord, Forecast, Goal, Insight, MetricReading, Protocol,
};

/// Backend table names
pub mod tables {
    pub const METRICS: &str = "health_metrics";
    pub const PROTOCOLS: &str = "user_protocols";
    pub const CHECK_INS: &str = "check_ins";
    pub const ASSESSMENTS: &str = "assessments";
    pub const DEVICES: &str = "connected_devices";
    pub const INSIGHTS: &str = "ai_insights";
    pub const FORECASTS: &str = "forecasts";
    pub const GOALS: &str = "goals";
    pub const ORG_MEMBERS: &str = "organisation_members";
    pub const DIGESTS: &str = "weekly_digests";
}

/// Read (and the one write) operations the service needs from the backend
///
/// Lists come back newest first unless a method says otherwise.
#[async_trait]
pub trait WellnessStore: Send + Sync {
    /// Metric readings recorded at or after `since`, oldest first
    async fn metrics_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricReading>>;

    async fn active_protocols(&self, user_id: &str) -> Result<Vec<Protocol>>;

    async fn recent_check_ins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>>;

    /// Check-ins created at or after `since` for any of `user_ids`
    async fn check_ins_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>>;

    async fn latest_assessment(&self, user_id: &str) -> Result<Option<Assessment>>;

    async fn devices(&self, user_id: &str) -> Result<Vec<Device>>;

    async fn recent_insights(&self, user_id: &str, limit: usize) -> Result<Vec<Insight>>;

    async fn recent_forecasts(&self, user_id: &str, limit: usize) -> Result<Vec<Forecast>>;

    async fn active_goals(&self, user_ids: &[String]) -> Result<Vec<Goal>>;

    /// User ids belonging to an organisation
    async fn organisation_members(&self, organisation_id: &str) -> Result<Vec<String>>;

    async fn save_digest(&self, record: DigestRecord) -> Result<()>;
}
