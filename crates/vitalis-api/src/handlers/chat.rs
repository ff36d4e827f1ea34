use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use vitalis_context::{ChatMode, UserContextBlock};
use vitalis_llm::{relay, ChatOptions, ChatRequest, ConversationMessage};

use crate::{
    auth,
    config::ChatConfig,
    error::{ApiError, ApiResult},
    rate_limit::RateLimitDecision,
    state::AppState,
};

/// `POST /chat` body: a conversation, or a single message
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Option<Vec<ConversationMessage>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub mode: Option<String>,
}

impl ChatBody {
    /// Unrecognised modes fall back to the default conversation
    pub fn mode(&self) -> ChatMode {
        match self.context.as_ref().and_then(|c| c.mode.as_deref()) {
            Some("focus") => ChatMode::Focus,
            _ => ChatMode::Default,
        }
    }

    pub fn into_conversation(self, limits: &ChatConfig) -> ApiResult<Vec<ConversationMessage>> {
        let conversation = match (self.messages, self.message) {
            (Some(messages), _) if !messages.is_empty() => messages,
            (_, Some(message)) => vec![ConversationMessage::user(message)],
            _ => {
                return Err(ApiError::BadRequest(
                    "messages must be a non-empty array".into(),
                ))
            }
        };

        if conversation.len() > limits.max_messages {
            return Err(ApiError::BadRequest(format!(
                "at most {} messages are allowed",
                limits.max_messages
            )));
        }

        for msg in &conversation {
            if msg.content.trim().is_empty() {
                return Err(ApiError::BadRequest("message content must not be empty".into()));
            }
            if msg.content.chars().count() > limits.max_message_chars {
                return Err(ApiError::BadRequest(format!(
                    "message content exceeds {} characters",
                    limits.max_message_chars
                )));
            }
        }

        Ok(conversation)
    }
}

/// Streams the assistant's answer back as server-sent events
///
/// Authenticated callers are rate limited and get their wellness data as
/// context. Anonymous callers get neither.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mode = body.mode();
    let conversation = body.into_conversation(&state.config.chat)?;

    let user_id = auth::resolve_user(state.identity.as_ref(), &headers).await;

    let user_context = match user_id.as_deref() {
        Some(user_id) => {
            if let RateLimitDecision::Denied { retry_after_secs } =
                state.rate_limiter.check(user_id).await
            {
                tracing::warn!(user_id, retry_after_secs, "Chat request rate limited");
                return Err(ApiError::RateLimited {
                    retry_after: retry_after_secs,
                });
            }

            state.context.assemble(user_id).await
        }
        None => {
            tracing::debug!("Anonymous chat request, skipping rate limit and context");
            UserContextBlock::no_data()
        }
    };

    tracing::info!(
        user_id = user_id.as_deref().unwrap_or("anonymous"),
        messages = conversation.len(),
        ?mode,
        has_context = !user_context.is_no_data(),
        "Forwarding chat request"
    );

    let messages = state.prompt.build(&user_context, conversation, mode, Utc::now());

    let mut options = ChatOptions::new();
    if let Some(temperature) = state.config.llm.temperature {
        options = options.temperature(temperature);
    }
    if let Some(max_tokens) = state.config.llm.max_tokens {
        options = options.max_tokens(max_tokens);
    }
    let request = ChatRequest::new(state.config.llm.model.clone(), messages).with_options(options);

    let upstream = state.llm_client.chat_stream_raw(request).await?;

    Ok((
        [(CONTENT_TYPE, "text/event-stream"), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(relay(upstream)),
    )
        .into_response())
}
