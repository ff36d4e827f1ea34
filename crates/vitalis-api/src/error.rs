use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use vitalis_digest::DigestError;
use vitalis_llm::GatewayError;

/// Retry hint sent when the gateway throttles without saying for how long
pub const DEFAULT_UPSTREAM_RETRY_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Digest(#[from] DigestError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, Option<u64>) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string(), None),
            ApiError::Digest(DigestError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please wait before sending another message.".to_string(),
                Some(*retry_after),
            ),
            ApiError::Gateway(GatewayError::RateLimited { retry_after }) => {
                tracing::warn!(?retry_after, "Gateway is rate limiting");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "The AI service is busy. Please try again shortly.".to_string(),
                    Some(retry_after.unwrap_or(DEFAULT_UPSTREAM_RETRY_SECS)),
                )
            }
            ApiError::Gateway(GatewayError::PaymentRequired) => {
                tracing::error!("Gateway reports exhausted credits");
                (
                    StatusCode::PAYMENT_REQUIRED,
                    "The AI service is temporarily unavailable.".to_string(),
                    None,
                )
            }
            ApiError::Gateway(e) => {
                tracing::error!("Gateway error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The AI service failed to respond. Please try again.".to_string(),
                    None,
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, retry_after) = self.parts();

        let mut response = (status, Json(ErrorBody { error, retry_after })).into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
