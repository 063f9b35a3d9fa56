use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::services::SessionStore;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
}

pub async fn health_check(State(sessions): State<SessionStore>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: sessions.len(),
        }),
    )
}

/// Ready once a backend credential and a reply target are configured
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let settings = &state.settings;
    if settings.backend.api_key.is_empty() || settings.transport.reply_url.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
