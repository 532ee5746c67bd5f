//! /webrtc/offer — the phone's signaling call.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use tridance_core::signal::{AnswerResponse, OfferRequest};

use super::ApiState;

pub async fn handle_offer(
    State(state): State<ApiState>,
    Json(offer): Json<OfferRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, String)> {
    let label = offer.label.clone();
    match state.signaling.answer(offer).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            tracing::warn!(label = ?label, error = %e, "rejecting offer");
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}
