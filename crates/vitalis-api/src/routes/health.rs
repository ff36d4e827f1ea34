use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Reports which collaborators are configured; it does not call them.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut services = HashMap::new();
    services.insert("gateway".to_string(), state.config.llm.base_url.clone());
    services.insert(
        "backend".to_string(),
        if state.config.backend_url.is_empty() {
            "unconfigured".to_string()
        } else {
            "configured".to_string()
        },
    );
    services.insert(
        "rate_limit".to_string(),
        format!(
            "{} per {}s",
            state.rate_limiter.max_requests(),
            state.config.rate_limit.window_secs
        ),
    );

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
    })
}
