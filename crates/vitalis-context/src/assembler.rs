use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use vitalis_persist::{
    Assessment, CheckIn, Device, Forecast, Insight, MetricReading, Protocol, WellnessStore,
};

use crate::alerts::detect_alerts;
use crate::metrics::{MetricKind, MetricStats, TRACKED_METRICS};
use crate::templates::NO_DATA_AVAILABLE;

/// Rendered, human-readable context handed to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContextBlock(String);

impl UserContextBlock {
    pub fn no_data() -> Self {
        Self(NO_DATA_AVAILABLE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_no_data(&self) -> bool {
        self.0 == NO_DATA_AVAILABLE
    }
}

impl fmt::Display for UserContextBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the context block for a user
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Never fails: unavailable sources are left out of the block
    async fn assemble(&self, user_id: &str) -> UserContextBlock;
}

#[derive(Debug, Clone)]
pub struct ContextLimits {
    pub metric_days: i64,
    pub check_ins: usize,
    pub insights: usize,
    pub forecasts: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            metric_days: 7,
            check_ins: 7,
            insights: 5,
            forecasts: 3,
        }
    }
}

/// Everything read for one request. `None` means the source could not be read.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub metrics: Option<Vec<MetricReading>>,
    pub protocols: Option<Vec<Protocol>>,
    pub check_ins: Option<Vec<CheckIn>>,
    pub assessment: Option<Assessment>,
    pub devices: Option<Vec<Device>>,
    pub insights: Option<Vec<Insight>>,
    pub forecasts: Option<Vec<Forecast>>,
}

pub struct ContextAssembler {
    store: Arc<dyn WellnessStore>,
    limits: ContextLimits,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn WellnessStore>) -> Self {
        Self {
            store,
            limits: ContextLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Read every source concurrently; failures become `None`
    pub async fn gather(&self, user_id: &str, now: DateTime<Utc>) -> UserContext {
        let ids = [user_id.to_string()];
        let since = now - Duration::days(self.limits.metric_days);
        let store = &self.store;

        let (metrics, protocols, check_ins, assessment, devices, insights, forecasts) = tokio::join!(
            store.metrics_since(&ids, since),
            store.active_protocols(user_id),
            store.recent_check_ins(user_id, self.limits.check_ins),
            store.latest_assessment(user_id),
            store.devices(user_id),
            store.recent_insights(user_id, self.limits.insights),
            store.recent_forecasts(user_id, self.limits.forecasts),
        );

        UserContext {
            metrics: soft("metrics", metrics),
            protocols: soft("protocols", protocols),
            check_ins: soft("check_ins", check_ins),
            assessment: soft("assessment", assessment).flatten(),
            devices: soft("devices", devices),
            insights: soft("insights", insights),
            forecasts: soft("forecasts", forecasts),
        }
    }

    pub async fn assemble_at(&self, user_id: &str, now: DateTime<Utc>) -> UserContextBlock {
        self.gather(user_id, now).await.render()
    }
}

#[async_trait]
impl ContextProvider for ContextAssembler {
    async fn assemble(&self, user_id: &str) -> UserContextBlock {
        self.assemble_at(user_id, Utc::now()).await
    }
}

fn soft<T>(source: &str, result: vitalis_persist::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(source, "Context source unavailable, continuing without it: {}", e);
            None
        }
    }
}

fn non_empty<T>(rows: &Option<Vec<T>>) -> Option<&[T]> {
    rows.as_deref().filter(|r| !r.is_empty())
}

fn day(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

impl UserContext {
    /// Metric values per type, oldest to newest
    pub fn metric_series(&self) -> HashMap<String, Vec<f64>> {
        let mut readings: Vec<&MetricReading> = self.metrics.iter().flatten().collect();
        readings.sort_by_key(|r| r.recorded_at);

        let mut series: HashMap<String, Vec<f64>> = HashMap::new();
        for reading in readings {
            series
                .entry(reading.metric_type.clone())
                .or_default()
                .push(reading.value);
        }
        series
    }

    pub fn metric_stats(&self) -> Vec<MetricStats> {
        let series = self.metric_series();
        TRACKED_METRICS
            .iter()
            .filter_map(|kind| {
                series
                    .get(kind.key)
                    .and_then(|values| MetricStats::from_series(*kind, values))
            })
            .collect()
    }

    pub fn render(&self) -> UserContextBlock {
        let mut sections: Vec<String> = Vec::new();

        let stats = self.metric_stats();
        if !stats.is_empty() {
            let lines: Vec<String> = stats.iter().map(MetricStats::render).collect();
            sections.push(format!("## Key metrics (last 7 days)\n{}", lines.join("\n")));
        }

        let alerts = detect_alerts(&self.metric_series());
        if !alerts.is_empty() {
            let lines: Vec<String> = alerts.iter().map(|a| format!("- {}", a)).collect();
            sections.push(format!("## Alerts\n{}", lines.join("\n")));
        }

        if let Some(protocols) = non_empty(&self.protocols) {
            let lines: Vec<String> = protocols.iter().map(render_protocol).collect();
            sections.push(format!("## Active protocols\n{}", lines.join("\n")));
        }

        if let Some(check_ins) = non_empty(&self.check_ins) {
            let lines: Vec<String> = check_ins.iter().map(render_check_in).collect();
            sections.push(format!("## Recent check-ins\n{}", lines.join("\n")));
        }

        if let Some(assessment) = &self.assessment {
            sections.push(format!("## Latest assessment\n{}", render_assessment(assessment)));
        }

        if let Some(devices) = non_empty(&self.devices) {
            let lines: Vec<String> = devices.iter().map(render_device).collect();
            sections.push(format!("## Connected devices\n{}", lines.join("\n")));
        }

        if let Some(insights) = non_empty(&self.insights) {
            let lines: Vec<String> = insights.iter().map(render_insight).collect();
            sections.push(format!("## Recent insights\n{}", lines.join("\n")));
        }

        if let Some(forecasts) = non_empty(&self.forecasts) {
            let lines: Vec<String> = forecasts.iter().map(render_forecast).collect();
            sections.push(format!("## Forecasts\n{}", lines.join("\n")));
        }

        if sections.is_empty() {
            UserContextBlock::no_data()
        } else {
            UserContextBlock(sections.join("\n\n"))
        }
    }
}

fn render_protocol(p: &Protocol) -> String {
    let mut line = format!("- {}", p.name);
    if let Some(category) = &p.category {
        line.push_str(&format!(" ({})", category));
    }
    if let Some(adherence) = p.adherence_pct {
        line.push_str(&format!(", adherence {:.0}%", adherence));
    }
    if let Some(started) = p.started_at {
        line.push_str(&format!(", since {}", day(started)));
    }
    line
}

fn render_check_in(c: &CheckIn) -> String {
    let scores: Vec<String> = [
        ("mood", c.mood),
        ("energy", c.energy),
        ("stress", c.stress),
        ("sleep quality", c.sleep_quality),
    ]
    .iter()
    .filter_map(|(label, value)| value.map(|v| format!("{} {:.0}/10", label, v)))
    .collect();

    let mut line = format!("- {}: ", day(c.created_at));
    if scores.is_empty() {
        line.push_str("no scores");
    } else {
        line.push_str(&scores.join(", "));
    }
    if let Some(notes) = c.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        line.push_str(&format!(". Notes: \"{}\"", notes));
    }
    line
}

fn render_assessment(a: &Assessment) -> String {
    let mut line = format!("- {}", a.assessment_type.as_deref().unwrap_or("Assessment"));
    if let Some(score) = a.score {
        line.push_str(&format!(": score {:.0}", score));
    }
    if let Some(completed) = a.completed_at {
        line.push_str(&format!(" ({})", day(completed)));
    }
    if let Some(summary) = a.summary.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!(". {}", summary));
    }
    line
}

fn render_device(d: &Device) -> String {
    let mut line = format!("- {}", d.provider);
    if let Some(name) = &d.device_name {
        line.push_str(&format!(" ({})", name));
    }
    match d.last_synced_at {
        Some(ts) => line.push_str(&format!(", last synced {}", ts.format("%Y-%m-%d %H:%M UTC"))),
        None => line.push_str(", never synced"),
    }
    line
}

fn render_insight(i: &Insight) -> String {
    match &i.title {
        Some(title) => format!("- {}: {}", title, i.content),
        None => format!("- {}", i.content),
    }
}

fn render_forecast(f: &Forecast) -> String {
    let (label, value) = match MetricKind::lookup(&f.metric_type) {
        Some(kind) => (kind.label.to_string(), kind.format(f.predicted_value)),
        None => (f.metric_type.clone(), format!("{:.1}", f.predicted_value)),
    };

    let mut line = format!("- {}: predicted {}", label, value);
    if let Some(target) = f.target_date {
        line.push_str(&format!(" by {}", day(target)));
    }
    if let Some(confidence) = f.confidence {
        // stored either as 0..1 or 0..100
        let pct = if confidence <= 1.0 { confidence * 100.0 } else { confidence };
        line.push_str(&format!(" (confidence {:.0}%)", pct));
    }
    line
}
