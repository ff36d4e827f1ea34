use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use vitalis_digest::{Digest, DigestRequest};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub success: bool,
    pub digest: Digest,
}

/// Builds the weekly digest for one user or a whole organisation
pub async fn generate_digest(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DigestRequest>, JsonRejection>,
) -> ApiResult<Json<DigestResponse>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::info!(mode = ?request.mode, "Generating weekly digest");

    let digest = state.digest.generate(request).await?;

    Ok(Json(DigestResponse {
        success: true,
        digest,
    }))
}
