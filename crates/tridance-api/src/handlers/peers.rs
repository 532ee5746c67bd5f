//! /peers handlers — session inspection and management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use tridance_services::{CloseReason, PeerSession, SessionPhase};

use super::ApiState;

#[derive(Serialize)]
pub struct PeerInfo {
    pub peer_id: String,
    pub label: Option<String>,
    pub phase: String,
    pub count: u64,
    pub accel: [Option<f32>; 3],
    pub gyro: [Option<f32>; 3],
    pub last_timestamp_ms: Option<f64>,
    pub last_seen_secs: u64,
    pub uptime_secs: u64,
}

impl From<&PeerSession> for PeerInfo {
    fn from(s: &PeerSession) -> Self {
        let a = &s.last_sample;
        Self {
            peer_id: s.peer_id.clone(),
            label: s.label.clone(),
            phase: phase_name(s.phase).to_string(),
            count: s.sample_count,
            accel: [a.ax, a.ay, a.az],
            gyro: [a.gx, a.gy, a.gz],
            last_timestamp_ms: s.last_timestamp_ms,
            last_seen_secs: s.last_seen.elapsed().as_secs(),
            uptime_secs: s.created_at.elapsed().as_secs(),
        }
    }
}

fn phase_name(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Connecting => "connecting",
        SessionPhase::Announced => "announced",
        SessionPhase::Active => "active",
        SessionPhase::Closed => "closed",
    }
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

/// Every live session, including ones still connecting.
pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let peers = state.hub.sessions().iter().map(PeerInfo::from).collect();
    Json(PeersResponse { peers })
}

// ── /peers/{id} (GET) ─────────────────────────────────────────────────────────

pub async fn handle_peer_inspect(
    State(state): State<ApiState>,
    Path(peer_id): Path<String>,
) -> Result<Json<PeerInfo>, (StatusCode, String)> {
    let session = state
        .hub
        .get(&peer_id)
        .ok_or((StatusCode::NOT_FOUND, "peer not found".to_string()))?;
    Ok(Json(PeerInfo::from(&session)))
}

// ── /peers/{id} (DELETE) ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeerDropResponse {
    pub peer_id: String,
    pub dropped: bool,
}

pub async fn handle_peer_drop(
    State(state): State<ApiState>,
    Path(peer_id): Path<String>,
) -> Json<PeerDropResponse> {
    let dropped = state.hub.get(&peer_id).is_some();
    state.signaling.disconnect(&peer_id, CloseReason::Dropped).await;

    if dropped {
        tracing::info!(peer_id = %peer_id, "peer dropped via API");
    }

    Json(PeerDropResponse { peer_id, dropped })
}
