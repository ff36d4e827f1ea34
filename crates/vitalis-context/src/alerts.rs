use std::collections::HashMap;
use std::fmt;

use crate::metrics::{HRV, SLEEP_HOURS, STRESS};

pub const MIN_SLEEP_HOURS: f64 = 6.0;
pub const HRV_DROP_RATIO: f64 = 0.15;
pub const MAX_STRESS: f64 = 70.0;

/// Threshold breaches surfaced ahead of the regular metrics
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    ShortSleep { hours: f64 },
    HrvDrop { previous: f64, latest: f64 },
    HighStress { score: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::ShortSleep { hours } => {
                write!(f, "Sleep below {} hours on the latest night ({:.1} h)", MIN_SLEEP_HOURS, hours)
            }
            Alert::HrvDrop { previous, latest } => {
                let pct = (previous - latest) / previous * 100.0;
                write!(
                    f,
                    "HRV dropped {:.0}% versus the previous reading ({:.0} ms to {:.0} ms)",
                    pct, previous, latest
                )
            }
            Alert::HighStress { score } => {
                write!(f, "Stress is elevated ({:.0}/100, threshold {:.0})", score, MAX_STRESS)
            }
        }
    }
}

/// Check per-metric series (oldest to newest) against the alert thresholds
pub fn detect_alerts(series: &HashMap<String, Vec<f64>>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(&hours) = series.get(SLEEP_HOURS).and_then(|v| v.last()) {
        if hours < MIN_SLEEP_HOURS {
            alerts.push(Alert::ShortSleep { hours });
        }
    }

    if let Some(values) = series.get(HRV) {
        if let [.., previous, latest] = values.as_slice() {
            if *previous > 0.0 && (previous - latest) / previous > HRV_DROP_RATIO {
                alerts.push(Alert::HrvDrop {
                    previous: *previous,
                    latest: *latest,
                });
            }
        }
    }

    if let Some(&score) = series.get(STRESS).and_then(|v| v.last()) {
        if score > MAX_STRESS {
            alerts.push(Alert::HighStress { score });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(entries: &[(&str, &[f64])]) -> HashMap<String, Vec<f64>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_no_alerts_for_healthy_readings() {
        let s = series(&[(SLEEP_HOURS, &[7.5]), (HRV, &[60.0, 58.0]), (STRESS, &[40.0])]);
        assert!(detect_alerts(&s).is_empty());
    }

    #[test]
    fn test_short_sleep_uses_latest_reading() {
        let s = series(&[(SLEEP_HOURS, &[5.0, 7.0])]);
        assert!(detect_alerts(&s).is_empty());

        let s = series(&[(SLEEP_HOURS, &[7.0, 5.5])]);
        assert_eq!(detect_alerts(&s), vec![Alert::ShortSleep { hours: 5.5 }]);
    }

    #[test]
    fn test_hrv_drop_threshold() {
        // exactly 15% is not a breach
        let s = series(&[(HRV, &[60.0, 51.0])]);
        assert!(detect_alerts(&s).is_empty());

        let s = series(&[(HRV, &[70.0, 60.0, 50.0])]);
        let alerts = detect_alerts(&s);
        assert_eq!(alerts, vec![Alert::HrvDrop { previous: 60.0, latest: 50.0 }]);
        assert!(alerts[0].to_string().contains("17%"));
    }

    #[test]
    fn test_single_hrv_reading_never_alerts() {
        let s = series(&[(HRV, &[20.0])]);
        assert!(detect_alerts(&s).is_empty());
    }

    #[test]
    fn test_high_stress() {
        let s = series(&[(STRESS, &[70.0])]);
        assert!(detect_alerts(&s).is_empty());

        let s = series(&[(STRESS, &[71.0])]);
        assert_eq!(detect_alerts(&s), vec![Alert::HighStress { score: 71.0 }]);
    }
}
