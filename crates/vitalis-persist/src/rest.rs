use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::builder::BackendConfig;
use crate::error::{PersistError, Result};
use crate::models::{
    Assessment, CheckIn, Device, DigestRecord, Forecast, Goal, Insight, MetricReading, Protocol,
};
use crate::store::{tables, WellnessStore};

/// `WellnessStore` over the backend's REST interface (PostgREST filters)
pub struct RestStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl RestStore {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            http_client: config.service_client()?,
            base_url: config.base_url.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .http_client
            .get(self.table_url(table))
            .query(query)
            .send()
            .await?;

        let response = check_status(table, response).await?;
        let rows = response.json::<Vec<Value>>().await?;
        Ok(decode_rows(table, rows))
    }
}

/// Decode rows one by one; a malformed row is skipped, not fatal to the read
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(table, "Skipping malformed row: {}", e);
                None
            }
        })
        .collect()
}

async fn check_status(table: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(table, status = status.as_u16(), "Backend query failed: {}", body);

    if status == reqwest::StatusCode::NOT_FOUND {
        Err(PersistError::TableNotFound(table.to_string()))
    } else {
        Err(PersistError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn any_of(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn gte(ts: DateTime<Utc>) -> String {
    format!("gte.{}", ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[derive(Deserialize)]
struct MemberRow {
    user_id: String,
}

#[async_trait]
impl WellnessStore for RestStore {
    async fn metrics_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricReading>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            tables::METRICS,
            &[
                ("select", "user_id,metric_type,value,unit,recorded_at".to_string()),
                ("user_id", any_of(user_ids)),
                ("recorded_at", gte(since)),
                ("order", "recorded_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn active_protocols(&self, user_id: &str) -> Result<Vec<Protocol>> {
        self.select(
            tables::PROTOCOLS,
            &[
                ("user_id", eq(user_id)),
                ("status", eq("active")),
                ("order", "started_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn recent_check_ins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>> {
        self.select(
            tables::CHECK_INS,
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn check_ins_since(
        &self,
        user_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            tables::CHECK_INS,
            &[
                ("user_id", any_of(user_ids)),
                ("created_at", gte(since)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn latest_assessment(&self, user_id: &str) -> Result<Option<Assessment>> {
        let rows: Vec<Assessment> = self
            .select(
                tables::ASSESSMENTS,
                &[
                    ("user_id", eq(user_id)),
                    ("order", "completed_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn devices(&self, user_id: &str) -> Result<Vec<Device>> {
        self.select(
            tables::DEVICES,
            &[
                ("user_id", eq(user_id)),
                ("order", "last_synced_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn recent_insights(&self, user_id: &str, limit: usize) -> Result<Vec<Insight>> {
        self.select(
            tables::INSIGHTS,
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn recent_forecasts(&self, user_id: &str, limit: usize) -> Result<Vec<Forecast>> {
        self.select(
            tables::FORECASTS,
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn active_goals(&self, user_ids: &[String]) -> Result<Vec<Goal>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            tables::GOALS,
            &[("user_id", any_of(user_ids)), ("status", eq("active"))],
        )
        .await
    }

    async fn organisation_members(&self, organisation_id: &str) -> Result<Vec<String>> {
        let rows: Vec<MemberRow> = self
            .select(
                tables::ORG_MEMBERS,
                &[
                    ("select", "user_id".to_string()),
                    ("organisation_id", eq(organisation_id)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }

    async fn save_digest(&self, record: DigestRecord) -> Result<()> {
        let response = self
            .http_client
            .post(self.table_url(tables::DIGESTS))
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await?;

        check_status(tables::DIGESTS, response).await?;
        Ok(())
    }
}
