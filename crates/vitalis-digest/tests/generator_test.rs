use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use vitalis_digest::{
    DigestError, DigestGenerator, DigestMode, DigestRequest, Direction, NarrativeSource,
};
use vitalis_llm::{ByteStream, ChatClient, ChatRequest, ChatResponse, GatewayError};
use vitalis_persist::{tables, CheckIn, Goal, MemoryStore, MetricReading};

/// Gateway stand-in answering every call the same way
enum FakeGateway {
    Fails,
    Replies(&'static str),
}

#[async_trait]
impl ChatClient for FakeGateway {
    async fn chat(&self, _request: ChatRequest) -> vitalis_llm::Result<ChatResponse> {
        match self {
            FakeGateway::Fails => Err(GatewayError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            }),
            FakeGateway::Replies(text) => Ok(ChatResponse {
                content: Some(text.to_string()),
                usage: None,
                finish_reason: Some("stop".to_string()),
            }),
        }
    }

    async fn chat_stream_raw(&self, _request: ChatRequest) -> vitalis_llm::Result<ByteStream> {
        Err(GatewayError::PaymentRequired)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap()
}

fn ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_metrics(
            "u1",
            vec![
                MetricReading::new("sleep_hours", 7.5, ago(10)),
                MetricReading::new("sleep_hours", 6.0, ago(2)),
            ],
        )
        .with_metrics("u2", vec![MetricReading::new("sleep_hours", 7.0, ago(1))])
        .with_check_ins("u1", vec![CheckIn::at(ago(1)), CheckIn::at(ago(2))])
        .with_check_ins("u2", vec![CheckIn::at(ago(3))])
        .with_goals(
            "u1",
            vec![Goal {
                id: Some("g1".to_string()),
                user_id: Some("u1".to_string()),
                title: "Sleep 8h".to_string(),
                metric_type: Some("sleep_hours".to_string()),
                target_value: Some(8.0),
                current_value: Some(6.0),
                status: Some("active".to_string()),
            }],
        )
        .with_members("org-1", vec!["u1".to_string(), "u2".to_string()])
}

fn personal(user_id: &str) -> DigestRequest {
    DigestRequest {
        mode: DigestMode::Personal,
        user_id: Some(user_id.to_string()),
        organisation_id: None,
    }
}

#[tokio::test]
async fn test_model_failure_uses_fallback_narrative() {
    let store = Arc::new(store());
    let generator = DigestGenerator::new(store.clone(), Arc::new(FakeGateway::Fails), "m");

    let digest = generator.generate_at(personal("u1"), now()).await.unwrap();

    assert_eq!(digest.narrative.source, NarrativeSource::Fallback);
    assert!(!digest.narrative.summary.is_empty());
    assert!(!digest.narrative.highlights.is_empty());
    assert!(!digest.narrative.recommendations.is_empty());

    let again = generator.generate_at(personal("u1"), now()).await.unwrap();
    assert_eq!(digest.narrative, again.narrative);
}

#[tokio::test]
async fn test_personal_digest_aggregates() {
    let generator = DigestGenerator::new(Arc::new(store()), Arc::new(FakeGateway::Fails), "m");
    let digest = generator.generate_at(personal("u1"), now()).await.unwrap();

    assert_eq!(digest.subject_id, "u1");
    assert_eq!(digest.check_in_count, 2);
    assert_eq!(digest.member_count, None);

    let sleep = &digest.metrics[0];
    assert_eq!(sleep.metric_type, "sleep_hours");
    assert_eq!(sleep.this_week_avg, Some(6.0));
    assert_eq!(sleep.previous_week_avg, Some(7.5));
    assert_eq!(sleep.change_pct, Some(-20.0));
    assert_eq!(sleep.direction, Direction::Down);

    assert_eq!(digest.goals[0].progress_pct, Some(75.0));
}

#[tokio::test]
async fn test_org_digest_spans_members() {
    let generator = DigestGenerator::new(Arc::new(store()), Arc::new(FakeGateway::Fails), "m");
    let request = DigestRequest {
        mode: DigestMode::Org,
        user_id: None,
        organisation_id: Some("org-1".to_string()),
    };

    let digest = generator.generate_at(request, now()).await.unwrap();

    assert_eq!(digest.member_count, Some(2));
    assert_eq!(digest.check_in_count, 3);
    assert_eq!(digest.metrics[0].this_week_avg, Some(6.5));
    assert!(digest.narrative.summary.contains("team of 2"));
}

#[tokio::test]
async fn test_ai_narrative_is_used_when_valid() {
    let reply = r#"{"summary": "Sleep dipped this week.", "highlights": ["Sleep down 20%"], "recommendations": ["Wind down at 10pm"]}"#;
    let generator =
        DigestGenerator::new(Arc::new(store()), Arc::new(FakeGateway::Replies(reply)), "m");

    let digest = generator.generate_at(personal("u1"), now()).await.unwrap();

    assert_eq!(digest.narrative.source, NarrativeSource::Ai);
    assert_eq!(digest.narrative.summary, "Sleep dipped this week.");
    assert_eq!(digest.narrative.recommendations, vec!["Wind down at 10pm".to_string()]);
}

#[tokio::test]
async fn test_unparseable_reply_falls_back() {
    let generator = DigestGenerator::new(
        Arc::new(store()),
        Arc::new(FakeGateway::Replies("Here is your digest!")),
        "m",
    );

    let digest = generator.generate_at(personal("u1"), now()).await.unwrap();
    assert_eq!(digest.narrative.source, NarrativeSource::Fallback);
}

#[tokio::test]
async fn test_missing_subject_is_rejected() {
    let generator = DigestGenerator::new(Arc::new(store()), Arc::new(FakeGateway::Fails), "m");

    let result = generator.generate_at(personal("  "), now()).await;
    assert!(matches!(result, Err(DigestError::InvalidRequest(_))));

    let result = generator
        .generate_at(
            DigestRequest {
                mode: DigestMode::Org,
                user_id: Some("u1".to_string()),
                organisation_id: None,
            },
            now(),
        )
        .await;
    assert!(matches!(result, Err(DigestError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_digest_is_saved_and_save_failure_is_ignored() {
    let store = Arc::new(store());
    let generator = DigestGenerator::new(store.clone(), Arc::new(FakeGateway::Fails), "m");
    generator.generate_at(personal("u1"), now()).await.unwrap();

    let saved = store.saved_digests();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].subject_type, "user");
    assert_eq!(saved[0].payload["check_in_count"], 2);

    let generator = DigestGenerator::new(
        Arc::new(MemoryStore::new().without_table(tables::DIGESTS)),
        Arc::new(FakeGateway::Fails),
        "m",
    );
    assert!(generator.generate_at(personal("u1"), now()).await.is_ok());
}
