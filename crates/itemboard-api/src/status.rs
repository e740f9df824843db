use axum::{Json, extract::State};

use itemboard_types::api::{CacheStatus, HealthResponse};

use crate::state::AppState;

/// GET /api/cache-status
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.recent.status().await)
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        connected_clients: state.dispatcher.connected_clients(),
    })
}
