use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use vitalis_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use vitalis_persist::{DigestRecord, WellnessStore};

use crate::aggregate::{aggregate, Aggregates};
use crate::error::{DigestError, Result};
use crate::narrative::{fallback_narrative, parse_narrative, DIGEST_SYSTEM_PROMPT};
use crate::types::{Digest, DigestMode, DigestRequest, Narrative};

/// Window read from the backend: this week plus the week before
const LOOKBACK_DAYS: i64 = 14;

pub struct DigestGenerator {
    store: Arc<dyn WellnessStore>,
    llm_client: Arc<dyn ChatClient>,
    model: String,
}

struct Subject {
    id: String,
    user_ids: Vec<String>,
    member_count: Option<usize>,
}

impl DigestGenerator {
    pub fn new(
        store: Arc<dyn WellnessStore>,
        llm_client: Arc<dyn ChatClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            llm_client,
            model: model.into(),
        }
    }

    pub async fn generate(&self, request: DigestRequest) -> Result<Digest> {
        self.generate_at(request, Utc::now()).await
    }

    pub async fn generate_at(&self, request: DigestRequest, now: DateTime<Utc>) -> Result<Digest> {
        let subject = self.resolve_subject(&request).await?;
        let since = now - Duration::days(LOOKBACK_DAYS);

        let (metrics, check_ins, goals) = tokio::join!(
            self.store.metrics_since(&subject.user_ids, since),
            self.store.check_ins_since(&subject.user_ids, since),
            self.store.active_goals(&subject.user_ids),
        );

        let metrics = or_empty("metrics", metrics);
        let check_ins = or_empty("check_ins", check_ins);
        let goals = or_empty("goals", goals);

        let aggregates = aggregate(&metrics, &check_ins, &goals, now);
        let narrative = self
            .narrate(&aggregates, request.mode, subject.member_count)
            .await;

        let digest = Digest {
            mode: request.mode,
            subject_id: subject.id,
            period_start: now - Duration::days(7),
            period_end: now,
            member_count: subject.member_count,
            metrics: aggregates.metrics,
            goals: aggregates.goals,
            check_in_count: aggregates.check_in_count,
            narrative,
        };

        self.save(&digest, now).await;

        tracing::info!(
            mode = ?digest.mode,
            subject = %digest.subject_id,
            metrics = digest.metrics.len(),
            source = ?digest.narrative.source,
            "Digest generated"
        );

        Ok(digest)
    }

    async fn resolve_subject(&self, request: &DigestRequest) -> Result<Subject> {
        match request.mode {
            DigestMode::Personal => {
                let user_id = non_blank(&request.user_id).ok_or_else(|| {
                    DigestError::InvalidRequest("user_id is required for personal digests".to_string())
                })?;
                Ok(Subject {
                    id: user_id.to_string(),
                    user_ids: vec![user_id.to_string()],
                    member_count: None,
                })
            }
            DigestMode::Org => {
                let org_id = non_blank(&request.organisation_id).ok_or_else(|| {
                    DigestError::InvalidRequest(
                        "organisation_id is required for org digests".to_string(),
                    )
                })?;
                let members = or_empty(
                    "organisation_members",
                    self.store.organisation_members(org_id).await,
                );
                Ok(Subject {
                    id: org_id.to_string(),
                    member_count: Some(members.len()),
                    user_ids: members,
                })
            }
        }
    }

    /// Ask the model for a narrative, falling back to the computed one
    async fn narrate(
        &self,
        aggregates: &Aggregates,
        mode: DigestMode,
        member_count: Option<usize>,
    ) -> Narrative {
        let fallback = fallback_narrative(aggregates, mode, member_count);

        let input = serde_json::json!({
            "mode": mode,
            "member_count": member_count,
            "metrics": aggregates.metrics,
            "goals": aggregates.goals,
            "check_in_count": aggregates.check_in_count,
        });

        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                Message::system(DIGEST_SYSTEM_PROMPT),
                Message::user(input.to_string()),
            ],
        )
        .with_options(ChatOptions::new().temperature(0.4));

        match self.llm_client.chat(request).await {
            Ok(response) => {
                let text = response.content.unwrap_or_default();
                parse_narrative(&text, &fallback).unwrap_or_else(|| {
                    tracing::warn!("Digest narrative was not valid JSON, using fallback");
                    fallback
                })
            }
            Err(e) => {
                tracing::warn!("Digest narrative call failed, using fallback: {}", e);
                fallback
            }
        }
    }

    async fn save(&self, digest: &Digest, now: DateTime<Utc>) {
        let payload = match serde_json::to_value(digest) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize digest: {}", e);
                return;
            }
        };

        let record = DigestRecord {
            subject_type: match digest.mode {
                DigestMode::Personal => "user".to_string(),
                DigestMode::Org => "organisation".to_string(),
            },
            subject_id: digest.subject_id.clone(),
            period_start: digest.period_start,
            period_end: digest.period_end,
            payload,
            created_at: now,
        };

        if let Err(e) = self.store.save_digest(record).await {
            tracing::warn!(subject = %digest.subject_id, "Failed to store digest: {}", e);
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn or_empty<T>(source: &str, result: vitalis_persist::Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(source, "Digest source unavailable, treating as empty: {}", e);
        Vec::new()
    })
}
