//! /ws — the viewer stream.
//!
//! Each viewer gets the current snapshot first, then every hub event in
//! emission order as one JSON text frame. A viewer that falls further
//! behind than the hub's buffer, or whose socket stops accepting frames
//! within the send deadline, is disconnected; its next connection starts
//! again from a snapshot. Sending `{"kind":"resync"}` asks for a
//! fresh snapshot without reconnecting.

use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use tridance_core::HubEvent;
use tridance_services::{SharedHub, ViewerFeed};

use super::ApiState;

pub async fn handle_viewer_ws(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let send_timeout = state.viewer_send_timeout;
    ws.on_upgrade(move |socket| viewer_loop(socket, hub, send_timeout))
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ViewerRequest {
    Resync,
}

/// Why a frame could not be handed to the viewer.
#[derive(Debug)]
enum SendFailure {
    /// The socket is gone.
    Closed,
    /// The socket stopped accepting frames within the deadline.
    Stalled,
}

async fn viewer_loop(socket: WebSocket, hub: SharedHub, send_timeout: Duration) {
    let ViewerFeed {
        snapshot,
        mut events,
    } = hub.subscribe();
    let (mut sink, mut stream) = socket.split();
    tracing::debug!(viewers = hub.status().viewers, "viewer attached");

    if send_event(&mut sink, &snapshot, send_timeout).await.is_err() {
        return;
    }

    loop {
        let sent = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => send_event(&mut sink, &event, send_timeout).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "viewer fell behind, disconnecting");
                    close_lagging(&mut sink, send_timeout).await;
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str(text.as_str()) {
                        Ok(ViewerRequest::Resync) => {
                            let snapshot = HubEvent::Snapshot { peers: hub.snapshot() };
                            send_event(&mut sink, &snapshot, send_timeout).await
                        }
                        Err(_) => Ok(()),
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => Ok(()),
            },
        };

        match sent {
            Ok(()) => {}
            Err(SendFailure::Stalled) => {
                tracing::warn!(
                    timeout_ms = send_timeout.as_millis() as u64,
                    "viewer stopped reading, disconnecting"
                );
                break;
            }
            Err(SendFailure::Closed) => break,
        }
    }
    tracing::debug!("viewer detached");
}

async fn close_lagging<S>(sink: &mut S, send_timeout: Duration)
where
    S: futures::Sink<Message> + Unpin,
{
    let close = Message::Close(Some(CloseFrame {
        code: close_code::AGAIN,
        reason: "viewer fell behind; reconnect to resync".into(),
    }));
    let _ = tokio::time::timeout(send_timeout, sink.send(close)).await;
}

async fn send_event<S>(
    sink: &mut S,
    event: &HubEvent,
    send_timeout: Duration,
) -> Result<(), SendFailure>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode hub event");
            return Ok(());
        }
    };
    match tokio::time::timeout(send_timeout, sink.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(SendFailure::Closed),
        Err(_) => Err(SendFailure::Stalled),
    }
}
