//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tridance_services::HubStatus;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub hub: HubStatus,
    pub connections: usize,
    pub liveness_timeout_secs: u64,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        hub: state.hub.status(),
        connections: state.signaling.connection_count(),
        liveness_timeout_secs: state.hub.liveness_timeout().as_secs(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── /daemon/shutdown ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub shutting_down: bool,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let shutting_down = state.shutdown_tx.send(()).is_ok();
    Json(ShutdownResponse { shutting_down })
}
