//! Broadcast hub — the canonical peer table and the viewer fan-out.
//!
//! Ingestion paths (one per phone) call into the hub concurrently. Each
//! read-modify-write of a peer's record, together with the event it
//! produces, runs under that peer's map entry guard, so the order of events
//! for one peer on the stream is the order they were applied. Different
//! peers do not wait on each other beyond sharing a map shard.
//!
//! Fan-out goes through a bounded `tokio::sync::broadcast` channel. Sending
//! never blocks ingestion. A viewer that falls more than `viewer_buffer`
//! events behind observes `Lagged` and is disconnected by its connection
//! handler; its client resynchronizes from a fresh snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use tridance_core::control::{parse_text_frame, ControlFrame, TextFrame};
use tridance_core::event::{HubEvent, PeerRecord, SampleUpdate};
use tridance_core::wire::decode;

use crate::session::{CloseReason, PeerSession, SessionPhase};

/// Shared between signaling, ingestion, the API and the sweeper.
pub type SharedHub = Arc<BroadcastHub>;

pub struct BroadcastHub {
    peers: DashMap<String, PeerSession>,
    events: broadcast::Sender<HubEvent>,
    liveness_timeout: Duration,
}

/// What a newly connected viewer receives: the snapshot to send first,
/// then every event from `events` in order.
pub struct ViewerFeed {
    pub snapshot: HubEvent,
    pub events: broadcast::Receiver<HubEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    /// Sessions visible to viewers.
    pub peers: usize,
    /// Sessions still waiting for their first frame.
    pub connecting: usize,
    pub viewers: usize,
    pub samples_total: u64,
}

impl BroadcastHub {
    pub fn new(viewer_buffer: usize, liveness_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(viewer_buffer.max(1));
        Self {
            peers: DashMap::new(),
            events,
            liveness_timeout,
        }
    }

    pub fn shared(viewer_buffer: usize, liveness_timeout: Duration) -> SharedHub {
        Arc::new(Self::new(viewer_buffer, liveness_timeout))
    }

    // ── Session lifecycle ────────────────────────────────────────────────────

    /// Create a `Connecting` session for a fresh signaling handshake and
    /// return its identifier. Invisible to viewers until its first frame.
    pub fn register(&self, label: Option<String>) -> String {
        loop {
            let peer_id = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(v) = self.peers.entry(peer_id.clone()) {
                v.insert(PeerSession::new(peer_id.clone(), label, Instant::now()));
                tracing::info!(peer_id = %peer_id, "session registered");
                return peer_id;
            }
        }
    }

    /// End a session. No-op if it is already gone.
    pub fn close(&self, peer_id: &str, reason: CloseReason) -> bool {
        self.close_if(peer_id, reason, |_| true)
    }

    /// Close the session only if `should_close` holds under its entry guard.
    fn close_if<F>(&self, peer_id: &str, reason: CloseReason, should_close: F) -> bool
    where
        F: FnOnce(&PeerSession) -> bool,
    {
        match self.peers.entry(peer_id.to_string()) {
            Entry::Occupied(mut o) => {
                if !should_close(o.get()) {
                    return false;
                }
                let visible = o.get().is_visible();
                o.get_mut().phase = SessionPhase::Closed;
                if visible {
                    self.emit(HubEvent::Left {
                        peer_id: peer_id.to_string(),
                    });
                }
                let session = o.remove();
                tracing::info!(
                    peer_id = %peer_id,
                    %reason,
                    samples = session.sample_count,
                    "session closed"
                );
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Close every session silent for longer than the liveness window.
    /// Returns the identifiers that were closed.
    pub fn sweep_expired(&self, now: Instant) -> Vec<String> {
        let stale: Vec<String> = self
            .peers
            .iter()
            .filter(|e| e.value().is_expired(now, self.liveness_timeout))
            .map(|e| e.key().clone())
            .collect();

        let mut closed = Vec::with_capacity(stale.len());
        for peer_id in stale {
            // Traffic may have arrived since the scan.
            let window = self.liveness_timeout;
            if self.close_if(&peer_id, CloseReason::LivenessTimeout, |s| {
                s.is_expired(now, window)
            }) {
                closed.push(peer_id);
            }
        }
        closed
    }

    // ── Ingestion ────────────────────────────────────────────────────────────

    /// Binary frame from a phone. Undecodable packets are dropped.
    ///
    /// A packet for an identifier with no live session starts a brand-new
    /// session with defaults.
    pub fn ingest_binary(&self, peer_id: &str, data: &[u8]) {
        let msg = match decode(data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(peer_id = %peer_id, error = %e, "dropping sample packet");
                return;
            }
        };

        let now = Instant::now();
        let mut session = self
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| PeerSession::new(peer_id, None, now));
        let count = session.apply_sample(&msg, now);

        let update = SampleUpdate::from_axes(peer_id, session.label.as_deref(), count, &msg.axes);
        self.emit(HubEvent::Sample(update));
    }

    /// Text frame from a phone: `hello`, `ping`, or anything else.
    pub fn ingest_text(&self, peer_id: &str, text: &str) {
        match parse_text_frame(text) {
            TextFrame::Control(ControlFrame::Ping { .. }) => {
                if let Some(mut s) = self.peers.get_mut(peer_id) {
                    s.touch(Instant::now());
                }
            }
            TextFrame::Control(ControlFrame::Hello { label }) => {
                let mut session = self
                    .peers
                    .entry(peer_id.to_string())
                    .or_insert_with(|| PeerSession::new(peer_id, None, Instant::now()));
                session.announce(label);
                tracing::info!(peer_id = %peer_id, label = ?session.label, "peer announced");
                self.emit(HubEvent::Hello {
                    peer_id: peer_id.to_string(),
                    label: session.label.clone(),
                });
            }
            TextFrame::Other(payload) => {
                // Relayed as-is; only `hello` may change the label.
                let mut session = self
                    .peers
                    .entry(peer_id.to_string())
                    .or_insert_with(|| PeerSession::new(peer_id, None, Instant::now()));
                session.announce(None);
                self.emit(HubEvent::Msg {
                    peer_id: peer_id.to_string(),
                    label: session.label.clone(),
                    payload: Some(payload),
                });
            }
        }
    }

    // ── Viewers ──────────────────────────────────────────────────────────────

    /// Attach a viewer. The receiver is created before the snapshot is read,
    /// so nothing applied after the snapshot can be missed; events already
    /// reflected in the snapshot may be replayed, which is idempotent.
    pub fn subscribe(&self) -> ViewerFeed {
        let events = self.events.subscribe();
        let snapshot = HubEvent::Snapshot {
            peers: self.snapshot(),
        };
        ViewerFeed { snapshot, events }
    }

    /// Visible sessions, ordered by identifier.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self
            .peers
            .iter()
            .filter(|e| e.value().is_visible())
            .map(|e| e.value().record())
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    fn emit(&self, event: HubEvent) {
        // Err only means no viewer is connected right now.
        let _ = self.events.send(event);
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn get(&self, peer_id: &str) -> Option<PeerSession> {
        self.peers.get(peer_id).map(|s| s.value().clone())
    }

    pub fn sessions(&self) -> Vec<PeerSession> {
        let mut all: Vec<PeerSession> = self.peers.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        all
    }

    pub fn status(&self) -> HubStatus {
        let mut status = HubStatus {
            peers: 0,
            connecting: 0,
            viewers: self.events.receiver_count(),
            samples_total: 0,
        };
        for e in self.peers.iter() {
            let s = e.value();
            if s.is_visible() {
                status.peers += 1;
            } else {
                status.connecting += 1;
            }
            status.samples_total += s.sample_count;
        }
        status
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }
}
