//! Signaling — answers a phone's WebRTC offer and wires its data channel
//! into the hub.
//!
//! Each successful handshake registers a `Connecting` session. Binary
//! messages on the channel go to `BroadcastHub::ingest_binary`, text
//! messages to `ingest_text`; channel close and a failed/closed/disconnected
//! peer connection both end the session.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use tridance_core::config::SignalingConfig;
use tridance_core::signal::{AnswerResponse, IceMode, OfferRequest};

use crate::hub::SharedHub;
use crate::session::CloseReason;

/// Errors that abort a handshake. The caller abandons the attempt; there is
/// no retry at this layer.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("expected an offer, got description type {0:?}")]
    UnexpectedType(String),

    #[error("offer description could not be parsed: {0}")]
    InvalidOffer(#[source] webrtc::Error),

    #[error("negotiation failed: {0}")]
    Negotiation(#[source] webrtc::Error),

    #[error("no local description after negotiation")]
    MissingAnswer,
}

type Connections = Arc<DashMap<String, Arc<RTCPeerConnection>>>;

/// Builds shared WebRTC API state once; answers offers concurrently.
pub struct Signaling {
    api: API,
    hub: SharedHub,
    stun_urls: Vec<String>,
    gather_timeout: Duration,
    connections: Connections,
}

impl Signaling {
    pub fn new(hub: SharedHub, config: &SignalingConfig) -> anyhow::Result<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            hub,
            stun_urls: config.stun_urls.clone(),
            gather_timeout: Duration::from_millis(config.gather_timeout_ms),
            connections: Arc::new(DashMap::new()),
        })
    }

    /// Answer one offer. On success the phone's session exists in the hub
    /// (phase `Connecting`) under the returned `peerId`.
    pub async fn answer(&self, offer: OfferRequest) -> Result<AnswerResponse, HandshakeError> {
        if offer.sdp_type != "offer" {
            return Err(HandshakeError::UnexpectedType(offer.sdp_type));
        }
        let description =
            RTCSessionDescription::offer(offer.sdp).map_err(HandshakeError::InvalidOffer)?;

        let ice_servers = match offer.ice {
            IceMode::Stun => vec![RTCIceServer {
                urls: self.stun_urls.clone(),
                ..Default::default()
            }],
            IceMode::None => Vec::new(),
        };
        let pc = Arc::new(
            self.api
                .new_peer_connection(RTCConfiguration {
                    ice_servers,
                    ..Default::default()
                })
                .await
                .map_err(HandshakeError::Negotiation)?,
        );

        let peer_id = self.hub.register(offer.label);
        self.wire_callbacks(&pc, &peer_id);

        match self.negotiate(&pc, description).await {
            Ok(local) => {
                self.connections.insert(peer_id.clone(), pc);
                tracing::info!(peer_id = %peer_id, ice = ?offer.ice, "offer answered");
                Ok(AnswerResponse {
                    sdp: local.sdp,
                    sdp_type: local.sdp_type.to_string(),
                    peer_id: Some(peer_id),
                })
            }
            Err(e) => {
                tracing::warn!(peer_id = %peer_id, error = %e, "handshake failed");
                self.hub.close(&peer_id, CloseReason::Dropped);
                if let Err(e) = pc.close().await {
                    tracing::debug!(error = %e, "closing failed peer connection");
                }
                Err(e)
            }
        }
    }

    async fn negotiate(
        &self,
        pc: &RTCPeerConnection,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription, HandshakeError> {
        pc.set_remote_description(offer)
            .await
            .map_err(HandshakeError::InvalidOffer)?;
        let answer = pc
            .create_answer(None)
            .await
            .map_err(HandshakeError::Negotiation)?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer)
            .await
            .map_err(HandshakeError::Negotiation)?;

        // Answer with whatever candidates exist once the bound passes.
        if tokio::time::timeout(self.gather_timeout, gather_complete.recv())
            .await
            .is_err()
        {
            tracing::debug!(
                timeout_ms = self.gather_timeout.as_millis() as u64,
                "ICE gathering incomplete, answering with partial candidates"
            );
        }

        pc.local_description()
            .await
            .ok_or(HandshakeError::MissingAnswer)
    }

    fn wire_callbacks(&self, pc: &Arc<RTCPeerConnection>, peer_id: &str) {
        let hub = self.hub.clone();
        let id = peer_id.to_string();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let hub = hub.clone();
            let id = id.clone();
            Box::pin(async move {
                tracing::debug!(peer_id = %id, channel = dc.label(), "data channel offered");

                let (msg_hub, msg_id) = (hub.clone(), id.clone());
                dc.on_message(Box::new(move |msg: DataChannelMessage| {
                    if msg.is_string {
                        match std::str::from_utf8(&msg.data) {
                            Ok(text) => msg_hub.ingest_text(&msg_id, text),
                            Err(_) => tracing::debug!(peer_id = %msg_id, "non-UTF-8 text frame"),
                        }
                    } else {
                        msg_hub.ingest_binary(&msg_id, &msg.data);
                    }
                    Box::pin(async {})
                }));

                let (close_hub, close_id) = (hub, id);
                dc.on_close(Box::new(move || {
                    close_hub.close(&close_id, CloseReason::ChannelClosed);
                    Box::pin(async {})
                }));
            })
        }));

        let hub = self.hub.clone();
        let connections = self.connections.clone();
        let id = peer_id.to_string();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            tracing::debug!(peer_id = %id, %state, "peer connection state");
            if matches!(
                state,
                RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed
                    | RTCPeerConnectionState::Disconnected
            ) {
                hub.close(&id, CloseReason::ChannelClosed);
                connections.remove(&id);
            }
            Box::pin(async {})
        }));
    }

    /// Tear down the transport for a session the hub already closed (or
    /// close both). Safe to call more than once.
    pub async fn disconnect(&self, peer_id: &str, reason: CloseReason) {
        self.hub.close(peer_id, reason);
        if let Some((_, pc)) = self.connections.remove(peer_id) {
            if let Err(e) = pc.close().await {
                tracing::debug!(peer_id = %peer_id, error = %e, "peer connection close failed");
            }
        }
    }

    /// Close every peer connection. Used on daemon shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.disconnect(&id, CloseReason::Dropped).await;
        }
    }

    pub fn hub(&self) -> &SharedHub {
        &self.hub
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
