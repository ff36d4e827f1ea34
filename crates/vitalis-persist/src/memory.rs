use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{PersistError, Result};
use crate::models::{
    Assessment, CheckIn, Device, DigestRecord, Forecast, Goal, Insight, MetricReading, Protocol,
};
use crate::store::{tables, WellnessStore};

/// In-process `WellnessStore` for local runs without a backend
///
/// Rows are keyed by user id. Tables listed via `without_table` answer with
/// `TableNotFound`, the way a backend missing a migration would.
#[derive(Default)]
pub struct MemoryStore {
    metrics: HashMap<String, Vec<MetricReading>>,
    protocols: HashMap<String, Vec<Protocol>>,
    check_ins: HashMap<String, Vec<CheckIn>>,
    assessments: HashMap<String, Assessment>,
    devices: HashMap<String, Vec<Device>>,
    insights: HashMap<String, Vec<Insight>>,
    forecasts: HashMap<String, Vec<Forecast>>,
    goals: HashMap<String, Vec<Goal>>,
    members: HashMap<String, Vec<String>>,
    missing_tables: HashSet<&'static str>,
    digests: Mutex<Vec<DigestRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, user_id: &str, readings: Vec<MetricReading>) -> Self {
        let readings = readings
            .into_iter()
            .map(|r| r.for_user(user_id))
            .collect::<Vec<_>>();
        self.metrics.entry(user_id.to_string()).or_default().extend(readings);
        self
    }

    pub fn with_protocols(mut self, user_id: &str, protocols: Vec<Protocol>) -> Self {
        self.protocols.insert(user_id.to_string(), protocols);
        self
    }

    pub fn with_check_ins(mut self, user_id: &str, check_ins: Vec<CheckIn>) -> Self {
        let check_ins = check_ins
            .into_iter()
            .map(|mut c| {
                c.user_id = Some(user_id.to_string());
                c
            })
            .collect::<Vec<_>>();
        self.check_ins.entry(user_id.to_string()).or_default().extend(check_ins);
        self
    }

    pub fn with_assessment(mut self, user_id: &str, assessment: Assessment) -> Self {
        self.assessments.insert(user_id.to_string(), assessment);
        self
    }

    pub fn with_devices(mut self, user_id: &str, devices: Vec<Device>) -> Self {
        self.devices.insert(user_id.to_string(), devices);
        self
    }

    pub fn with_insights(mut self, user_id: &str, insights: Vec<Insight>) -> Self {
        self.insights.insert(user_id.to_string(), insights);
        self
    }

    pub fn with_forecasts(mut self, user_id: &str, forecasts: Vec<Forecast>) -> Self {
        self.forecasts.insert(user_id.to_string(), forecasts);
        self
    }

    pub fn with_goals(mut self, user_id: &str, goals: Vec<Goal>) -> Self {
        self.goals.insert(user_id.to_string(), goals);
        self
    }

    pub fn with_members(mut self, organisation_id: &str, user_ids: Vec<String>) -> Self {
        self.members.insert(organisation_id.to_string(), user_ids);
        self
    }

    pub fn without_table(mut self, table: &'static str) -> Self {
        self.missing_tables.insert(table);
        self
    }

    /// Digests written so far
    pub fn saved_digests(&self) -> Vec<DigestRecord> {
        self.digests.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn ensure_table(&self, table: &'static str) -> Result<()> {
        if self.missing_tables.contains(table) {
            Err(PersistError::TableNotFound(table.to_string()))
        } else {
            Ok(())
        }
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, key: F, limit: usize) -> Vec<T>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl WellnessStore for MemoryStore {
    async fn metrics_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricReading>> {
        self.ensure_table(tables::METRICS)?;
        let mut rows: Vec<MetricReading> = user_ids
            .iter()
            .filter_map(|id| self.metrics.get(id))
            .flatten()
            .filter(|r| r.recorded_at >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.recorded_at);
        Ok(rows)
    }

    async fn active_protocols(&self, user_id: &str) -> Result<Vec<Protocol>> {
        self.ensure_table(tables::PROTOCOLS)?;
        Ok(self
            .protocols
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|p| p.status.as_deref().map_or(true, |s| s == "active"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recent_check_ins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>> {
        self.ensure_table(tables::CHECK_INS)?;
        let rows = self.check_ins.get(user_id).cloned().unwrap_or_default();
        Ok(newest_first(rows, |c| Some(c.created_at), limit))
    }

    async fn check_ins_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>> {
        self.ensure_table(tables::CHECK_INS)?;
        let rows: Vec<CheckIn> = user_ids
            .iter()
            .filter_map(|id| self.check_ins.get(id))
            .flatten()
            .filter(|c| c.created_at >= since)
            .cloned()
            .collect();
        Ok(newest_first(rows, |c| Some(c.created_at), usize::MAX))
    }

    async fn latest_assessment(&self, user_id: &str) -> Result<Option<Assessment>> {
        self.ensure_table(tables::ASSESSMENTS)?;
        Ok(self.assessments.get(user_id).cloned())
    }

    async fn devices(&self, user_id: &str) -> Result<Vec<Device>> {
        self.ensure_table(tables::DEVICES)?;
        Ok(self.devices.get(user_id).cloned().unwrap_or_default())
    }

    async fn recent_insights(&self, user_id: &str, limit: usize) -> Result<Vec<Insight>> {
        self.ensure_table(tables::INSIGHTS)?;
        let rows = self.insights.get(user_id).cloned().unwrap_or_default();
        Ok(newest_first(rows, |i| i.created_at, limit))
    }

    async fn recent_forecasts(&self, user_id: &str, limit: usize) -> Result<Vec<Forecast>> {
        self.ensure_table(tables::FORECASTS)?;
        let rows = self.forecasts.get(user_id).cloned().unwrap_or_default();
        Ok(newest_first(rows, |f| f.created_at, limit))
    }

    async fn active_goals(&self, user_ids: &[String]) -> Result<Vec<Goal>> {
        self.ensure_table(tables::GOALS)?;
        Ok(user_ids
            .iter()
            .filter_map(|id| self.goals.get(id))
            .flatten()
            .filter(|g| g.status.as_deref().map_or(true, |s| s == "active"))
            .cloned()
            .collect())
    }

    async fn organisation_members(&self, organisation_id: &str) -> Result<Vec<String>> {
        self.ensure_table(tables::ORG_MEMBERS)?;
        Ok(self.members.get(organisation_id).cloned().unwrap_or_default())
    }

    async fn save_digest(&self, record: DigestRecord) -> Result<()> {
        self.ensure_table(tables::DIGESTS)?;
        self.digests
            .lock()
            .map_err(|_| PersistError::Internal("digest log poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}
