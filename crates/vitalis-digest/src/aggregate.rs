use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use vitalis_context::TRACKED_METRICS;
use vitalis_persist::{CheckIn, Goal, MetricReading};

use crate::types::{Direction, GoalProgress, MetricTrend};

/// Change (in percent) still reported as stable
const STABLE_PCT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub metrics: Vec<MetricTrend>,
    pub goals: Vec<GoalProgress>,
    pub check_in_count: usize,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn change_pct(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => Some((c - p) / p * 100.0),
        _ => None,
    }
}

fn direction(current: Option<f64>, previous: Option<f64>, pct: Option<f64>) -> Direction {
    match (current, previous, pct) {
        (Some(_), None, _) => Direction::NoBaseline,
        (None, Some(_), _) => Direction::NoRecentData,
        (_, _, Some(pct)) if pct > STABLE_PCT => Direction::Up,
        (_, _, Some(pct)) if pct < -STABLE_PCT => Direction::Down,
        _ => Direction::Stable,
    }
}

/// Compare the last seven days with the seven before them
pub fn aggregate(
    readings: &[MetricReading],
    check_ins: &[CheckIn],
    goals: &[Goal],
    now: DateTime<Utc>,
) -> Aggregates {
    let week_start = now - Duration::days(7);
    let previous_start = now - Duration::days(14);

    let metrics = TRACKED_METRICS
        .iter()
        .filter_map(|kind| {
            let mut this_week = Vec::new();
            let mut previous_week = Vec::new();
            for r in readings.iter().filter(|r| r.metric_type == kind.key) {
                if r.recorded_at >= week_start && r.recorded_at <= now {
                    this_week.push(r.value);
                } else if r.recorded_at >= previous_start && r.recorded_at < week_start {
                    previous_week.push(r.value);
                }
            }

            if this_week.is_empty() && previous_week.is_empty() {
                return None;
            }

            let current = mean(&this_week);
            let previous = mean(&previous_week);
            let pct = change_pct(current, previous);

            Some(MetricTrend {
                metric_type: kind.key.to_string(),
                label: kind.label.to_string(),
                this_week_avg: current,
                previous_week_avg: previous,
                change_pct: pct,
                direction: direction(current, previous, pct),
                readings: this_week.len() + previous_week.len(),
            })
        })
        .collect();

    let goals = goals
        .iter()
        .map(|g| GoalProgress {
            title: g.title.clone(),
            metric_type: g.metric_type.clone(),
            target_value: g.target_value,
            current_value: g.current_value,
            progress_pct: g.progress_pct(),
        })
        .collect();

    let check_in_count = check_ins
        .iter()
        .filter(|c| c.created_at >= week_start && c.created_at <= now)
        .count();

    Aggregates {
        metrics,
        goals,
        check_in_count,
    }
}
