use serde::Deserialize;

use crate::aggregate::Aggregates;
use crate::types::{Direction, DigestMode, Narrative, NarrativeSource};

pub const DIGEST_SYSTEM_PROMPT: &str = r#"You write the weekly wellness digest for the Vitalis app.

You receive this week's aggregated data as JSON. Reply with JSON only, no markdown fences, in exactly this shape:
{"summary": "<two or three sentences>", "highlights": ["<short bullet>", ...], "recommendations": ["<short actionable bullet>", ...]}

Rules:
- Never fabricate data. Only mention numbers present in the input.
- Give two to four highlights and two or three recommendations.
- For an organisation digest, talk about the team in aggregate and never single out individuals.
- Warm, concise, practical tone."#;

const MAX_HIGHLIGHTS: usize = 3;

#[derive(Deserialize)]
struct ModelNarrative {
    summary: String,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Parse the model's JSON reply; `None` when unusable
///
/// Empty highlight or recommendation lists are filled from `fallback`.
pub fn parse_narrative(text: &str, fallback: &Narrative) -> Option<Narrative> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let parsed: ModelNarrative = serde_json::from_str(&text[start..=end]).ok()?;
    if parsed.summary.trim().is_empty() {
        return None;
    }

    let clean = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    let mut highlights = clean(parsed.highlights);
    if highlights.is_empty() {
        highlights = fallback.highlights.clone();
    }
    let mut recommendations = clean(parsed.recommendations);
    if recommendations.is_empty() {
        recommendations = fallback.recommendations.clone();
    }

    Some(Narrative {
        summary: parsed.summary.trim().to_string(),
        highlights,
        recommendations,
        source: NarrativeSource::Ai,
    })
}

fn metric_avg(agg: &Aggregates, key: &str) -> Option<f64> {
    agg.metrics
        .iter()
        .find(|m| m.metric_type == key)
        .and_then(|m| m.this_week_avg)
}

fn metric_direction(agg: &Aggregates, key: &str) -> Option<Direction> {
    agg.metrics
        .iter()
        .find(|m| m.metric_type == key)
        .map(|m| m.direction)
}

/// Narrative built from the numbers alone, same input same output
pub fn fallback_narrative(
    agg: &Aggregates,
    mode: DigestMode,
    member_count: Option<usize>,
) -> Narrative {
    let readings: usize = agg.metrics.iter().map(|m| m.readings).sum();

    let summary = match mode {
        DigestMode::Personal => format!(
            "This week you logged {} check-in{} and {} metric readings across {} tracked metric{}.",
            agg.check_in_count,
            if agg.check_in_count == 1 { "" } else { "s" },
            readings,
            agg.metrics.len(),
            if agg.metrics.len() == 1 { "" } else { "s" },
        ),
        DigestMode::Org => format!(
            "This week your team of {} logged {} check-ins and {} metric readings across {} tracked metrics.",
            member_count.unwrap_or(0),
            agg.check_in_count,
            readings,
            agg.metrics.len(),
        ),
    };

    let mut movers: Vec<_> = agg
        .metrics
        .iter()
        .filter_map(|m| m.change_pct.map(|pct| (m, pct)))
        .filter(|(m, _)| matches!(m.direction, Direction::Up | Direction::Down))
        .collect();
    movers.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.label.cmp(&b.0.label)));

    let mut highlights: Vec<String> = movers
        .iter()
        .take(MAX_HIGHLIGHTS)
        .map(|(m, pct)| {
            format!(
                "{} {} {:.0}% week over week",
                m.label,
                if *pct > 0.0 { "up" } else { "down" },
                pct.abs()
            )
        })
        .collect();

    for goal in agg.goals.iter().filter(|g| g.progress_pct.is_some()) {
        if highlights.len() >= MAX_HIGHLIGHTS + 1 {
            break;
        }
        if let Some(pct) = goal.progress_pct {
            highlights.push(format!("{}: {:.0}% of target", goal.title, pct));
        }
    }

    if highlights.is_empty() {
        highlights.push("Not enough data yet to compare this week with last week.".to_string());
    }

    let mut recommendations = Vec::new();
    if metric_avg(agg, "sleep_hours").is_some_and(|h| h < 7.0) {
        recommendations.push(
            "Keep a consistent bedtime to bring average sleep back above 7 hours.".to_string(),
        );
    }
    if metric_direction(agg, "hrv") == Some(Direction::Down) {
        recommendations.push(
            "HRV is trending down: plan a lighter day and protect recovery time.".to_string(),
        );
    }
    if metric_avg(agg, "stress").is_some_and(|s| s > 60.0) {
        recommendations.push(
            "Stress ran high: block two short breathing breaks into each workday.".to_string(),
        );
    }
    if agg.goals.iter().any(|g| g.progress_pct.is_some_and(|p| p < 50.0)) {
        recommendations.push(
            "Pick the goal furthest from target and set one small daily step towards it."
                .to_string(),
        );
    }
    let expected_check_ins = 3 * member_count.unwrap_or(1).max(1);
    if agg.check_in_count < expected_check_ins {
        recommendations.push(
            "Complete a short daily check-in so next week's digest can spot patterns.".to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push(
            "Keep your current routine going and compare again next week.".to_string(),
        );
    }

    Narrative {
        summary,
        highlights,
        recommendations,
        source: NarrativeSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GoalProgress, MetricTrend};

    fn trend(key: &str, label: &str, now: f64, prev: f64, direction: Direction) -> MetricTrend {
        MetricTrend {
            metric_type: key.to_string(),
            label: label.to_string(),
            this_week_avg: Some(now),
            previous_week_avg: Some(prev),
            change_pct: Some((now - prev) / prev * 100.0),
            direction,
            readings: 4,
        }
    }

    fn empty() -> Aggregates {
        Aggregates {
            metrics: vec![],
            goals: vec![],
            check_in_count: 0,
        }
    }

    #[test]
    fn test_fallback_with_no_data_is_not_empty() {
        let narrative = fallback_narrative(&empty(), DigestMode::Personal, None);

        assert!(!narrative.summary.is_empty());
        assert!(!narrative.highlights.is_empty());
        assert!(!narrative.recommendations.is_empty());
        assert_eq!(narrative.source, NarrativeSource::Fallback);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let agg = Aggregates {
            metrics: vec![
                trend("hrv", "HRV", 45.0, 60.0, Direction::Down),
                trend("sleep_hours", "Sleep", 6.5, 7.0, Direction::Down),
            ],
            goals: vec![GoalProgress {
                title: "Sleep 8h".to_string(),
                metric_type: Some("sleep_hours".to_string()),
                target_value: Some(8.0),
                current_value: Some(6.5),
                progress_pct: Some(81.25),
            }],
            check_in_count: 5,
        };

        let first = fallback_narrative(&agg, DigestMode::Personal, None);
        let second = fallback_narrative(&agg, DigestMode::Personal, None);
        assert_eq!(first, second);

        assert_eq!(first.highlights[0], "HRV down 25% week over week");
        assert_eq!(first.highlights[1], "Sleep down 7% week over week");
        assert_eq!(first.highlights[2], "Sleep 8h: 81% of target");
        assert_eq!(first.recommendations.len(), 2);
        assert!(first.summary.contains("5 check-ins"));
    }

    #[test]
    fn test_org_summary_mentions_team() {
        let narrative = fallback_narrative(&empty(), DigestMode::Org, Some(8));
        assert!(narrative.summary.contains("team of 8"));
    }

    #[test]
    fn test_parse_narrative_strips_fences() {
        let fallback = fallback_narrative(&empty(), DigestMode::Personal, None);
        let text = "```json\n{\"summary\": \"Good week.\", \"highlights\": [\"Sleep up\"], \"recommendations\": []}\n```";

        let narrative = parse_narrative(text, &fallback).unwrap();
        assert_eq!(narrative.summary, "Good week.");
        assert_eq!(narrative.highlights, vec!["Sleep up".to_string()]);
        assert_eq!(narrative.recommendations, fallback.recommendations);
        assert_eq!(narrative.source, NarrativeSource::Ai);
    }

    #[test]
    fn test_parse_narrative_rejects_garbage() {
        let fallback = fallback_narrative(&empty(), DigestMode::Personal, None);

        assert!(parse_narrative("I cannot do that", &fallback).is_none());
        assert!(parse_narrative("{\"summary\": \"  \"}", &fallback).is_none());
        assert!(parse_narrative("} oops {", &fallback).is_none());
    }
}
