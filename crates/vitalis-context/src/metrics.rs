use std::fmt;

use serde::{Deserialize, Serialize};

/// A metric type the assistant summarises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricKind {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub decimals: usize,
}

impl MetricKind {
    pub fn format(&self, value: f64) -> String {
        let number = format!("{:.*}", self.decimals, value);
        match self.unit {
            "" => number,
            unit if unit.starts_with('/') || unit == "%" => format!("{}{}", number, unit),
            unit => format!("{} {}", number, unit),
        }
    }

    pub fn lookup(key: &str) -> Option<&'static MetricKind> {
        TRACKED_METRICS.iter().find(|k| k.key == key)
    }
}

pub const SLEEP_HOURS: &str = "sleep_hours";
pub const HRV: &str = "hrv";
pub const STRESS: &str = "stress";

pub const TRACKED_METRICS: &[MetricKind] = &[
    MetricKind { key: SLEEP_HOURS, label: "Sleep", unit: "h", decimals: 1 },
    MetricKind { key: HRV, label: "HRV", unit: "ms", decimals: 0 },
    MetricKind { key: "resting_hr", label: "Resting heart rate", unit: "bpm", decimals: 0 },
    MetricKind { key: STRESS, label: "Stress", unit: "/100", decimals: 0 },
    MetricKind { key: "recovery", label: "Recovery", unit: "%", decimals: 0 },
    MetricKind { key: "steps", label: "Steps", unit: "", decimals: 0 },
    MetricKind { key: "focus_score", label: "Focus score", unit: "/100", decimals: 0 },
];

/// Relative distance from the midpoint still counted as stable
const STABLE_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient data for trend",
        };
        f.write_str(text)
    }
}

/// Compare the most recent reading with the midpoint reading
///
/// `values` is ordered oldest to newest.
pub fn classify_trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::InsufficientData;
    }

    let latest = values[values.len() - 1];
    let midpoint = values[(values.len() - 1) / 2];
    let band = midpoint.abs() * STABLE_BAND;

    if latest > midpoint + band {
        Trend::Up
    } else if latest < midpoint - band {
        Trend::Down
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub kind: MetricKind,
    pub latest: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub trend: Trend,
}

impl MetricStats {
    /// `None` for an empty series. `values` is ordered oldest to newest.
    pub fn from_series(kind: MetricKind, values: &[f64]) -> Option<Self> {
        let latest = *values.last()?;
        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            kind,
            latest,
            average: sum / values.len() as f64,
            min,
            max,
            count: values.len(),
            trend: classify_trend(values),
        })
    }

    pub fn render(&self) -> String {
        let k = &self.kind;
        format!(
            "- {}: latest {}, 7-day avg {}, range {} to {}, trend: {} ({} readings)",
            k.label,
            k.format(self.latest),
            k.format(self.average),
            k.format(self.min),
            k.format(self.max),
            self.trend,
            self.count,
        )
    }
}
