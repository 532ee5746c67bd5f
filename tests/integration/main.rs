//! TriDance integration test harness.
//!
//! Each test starts its own hub in-process on 127.0.0.1:0 and talks to it
//! over real HTTP and WebSocket connections. Phones are stood in for by
//! driving the hub's ingest methods directly, except in `phone.rs`, which
//! negotiates a real data channel and skips when the host cannot.
//!
//!   cargo test --test integration

mod api;
mod phone;
mod viewers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tridance_core::config::SignalingConfig;
use tridance_core::HubEvent;
use tridance_services::{BroadcastHub, SharedHub, Signaling};

pub type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
pub const VIEWER_SEND_TIMEOUT: Duration = Duration::from_millis(500);

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct TestHub {
    pub addr: SocketAddr,
    pub hub: SharedHub,
    pub signaling: Arc<Signaling>,
    server: tokio::task::JoinHandle<Result<()>>,
}

impl TestHub {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub async fn start_hub(viewer_buffer: usize) -> Result<TestHub> {
    let hub = BroadcastHub::shared(viewer_buffer, Duration::from_secs(15));
    let config = SignalingConfig {
        stun_urls: Vec::new(),
        gather_timeout_ms: 500,
    };
    let signaling = Arc::new(Signaling::new(hub.clone(), &config)?);
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let state =
        tridance_api::ApiState::new(signaling.clone(), shutdown_tx, VIEWER_SEND_TIMEOUT);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(tridance_api::serve_listener(state, listener));

    Ok(TestHub {
        addr,
        hub,
        signaling,
        server,
    })
}

/// Open a viewer stream and return it with its opening snapshot.
pub async fn connect_viewer(hub: &TestHub) -> Result<(Viewer, HubEvent)> {
    let (mut ws, _) = connect_async(format!("ws://{}/ws", hub.addr))
        .await
        .context("viewer connect failed")?;
    let first = next_event(&mut ws).await?;
    Ok((ws, first))
}

/// Next hub event on a viewer stream, skipping control frames.
pub async fn next_event(ws: &mut Viewer) -> Result<HubEvent> {
    next_event_within(ws, EVENT_TIMEOUT).await
}

pub async fn next_event_within(ws: &mut Viewer, wait: Duration) -> Result<HubEvent> {
    loop {
        let frame = tokio::time::timeout(wait, ws.next())
            .await
            .context("timed out waiting for a hub event")?;
        match frame {
            Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(text.as_str())?),
            Some(Ok(Message::Close(frame))) => bail!("viewer stream closed: {:?}", frame),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => bail!("viewer stream ended"),
        }
    }
}
