//! Liveness sweeper — closes sessions that stopped sending samples and
//! pings. Runs until shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::session::CloseReason;
use crate::signaling::Signaling;

/// Periodically close silent sessions and release their transports.
pub async fn expiry_loop(
    signaling: Arc<Signaling>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    tracing::info!(
        period_ms = period.as_millis() as u64,
        timeout_secs = signaling.hub().liveness_timeout().as_secs(),
        "liveness sweeper starting"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("liveness sweeper shutting down");
                return;
            }
            _ = interval.tick() => {
                for peer_id in signaling.hub().sweep_expired(Instant::now()) {
                    tracing::info!(peer_id = %peer_id, "session timed out");
                    signaling.disconnect(&peer_id, CloseReason::LivenessTimeout).await;
                }
            }
        }
    }
}
