use crate::AppState;
use crate::services::queue::QueueState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub queue: String,
    pub queued_jobs: usize,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Liveness", body = String)
    ),
    tag = "system"
)]
pub async fn root() -> &'static str {
    "Server is running!"
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let connected = |ok: bool| {
        if ok {
            "connected".to_string()
        } else {
            "disconnected".to_string()
        }
    };
    let queue = state.queue.status();

    Json(HealthResponse {
        status: "ok".to_string(),
        database: connected(state.store.ping().await),
        storage: connected(state.storage.health_check().await),
        queue: match queue.state() {
            QueueState::Idle => "idle",
            QueueState::Draining => "draining",
        }
        .to_string(),
        queued_jobs: state.queue.pending(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
