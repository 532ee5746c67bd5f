//! HTTP and WebSocket handlers — exposes hub state as JSON and events as a
//! viewer stream.

pub mod peers;
pub mod signal;
pub mod status;
pub mod viewers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tridance_services::{SharedHub, Signaling};

#[derive(Clone)]
pub struct ApiState {
    pub hub: SharedHub,
    pub signaling: Arc<Signaling>,
    pub started_at: Instant,
    /// Deadline for handing one frame to a viewer's socket.
    pub viewer_send_timeout: Duration,
    /// Fires once to stop the daemon.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl ApiState {
    pub fn new(
        signaling: Arc<Signaling>,
        shutdown_tx: tokio::sync::broadcast::Sender<()>,
        viewer_send_timeout: Duration,
    ) -> Self {
        Self {
            hub: signaling.hub().clone(),
            signaling,
            started_at: Instant::now(),
            viewer_send_timeout,
            shutdown_tx,
        }
    }
}

// Re-export handler functions for use in router setup.
pub use peers::{handle_peer_drop, handle_peer_inspect, handle_peers};
pub use signal::handle_offer;
pub use status::{handle_shutdown, handle_status};
pub use viewers::handle_viewer_ws;
