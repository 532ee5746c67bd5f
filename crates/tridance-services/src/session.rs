//! Peer session — per-phone state kept by the hub.

use std::time::{Duration, Instant};

use tridance_core::event::PeerRecord;
use tridance_core::wire::{Axes, SampleMessage};

/// Lifecycle of a phone's session.
///
/// `Connecting → Announced → Active → Closed`. `Closed` is terminal and the
/// session leaves the table at the same moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Handshake answered, nothing received on the channel yet.
    Connecting,
    /// `hello` (or another text frame) seen, no sample yet.
    Announced,
    /// At least one sample applied.
    Active,
    Closed,
}

/// Why a session ended. Both paths are handled identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ChannelClosed,
    LivenessTimeout,
    Dropped,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::ChannelClosed => "channel closed",
            CloseReason::LivenessTimeout => "liveness timeout",
            CloseReason::Dropped => "dropped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct PeerSession {
    /// Stable for the session's lifetime; unique across live sessions.
    pub peer_id: String,
    pub label: Option<String>,
    /// Last known value of each axis. Absent axes in a packet never clear it.
    pub last_sample: Axes,
    /// Producer-authoritative sample count. Never decreases.
    pub sample_count: u64,
    pub phase: SessionPhase,
    /// Producer clock of the newest applied packet.
    pub last_timestamp_ms: Option<f64>,
    pub created_at: Instant,
    /// Last sample or ping.
    pub last_seen: Instant,
    highest_seq: Option<u16>,
}

impl PeerSession {
    pub fn new(peer_id: impl Into<String>, label: Option<String>, now: Instant) -> Self {
        Self {
            peer_id: peer_id.into(),
            label,
            last_sample: Axes::default(),
            sample_count: 0,
            phase: SessionPhase::Connecting,
            last_timestamp_ms: None,
            created_at: now,
            last_seen: now,
            highest_seq: None,
        }
    }

    /// Handle `hello` or any other text frame. A label replaces the one
    /// given at signaling time; `None` keeps it.
    pub fn announce(&mut self, label: Option<String>) {
        if label.is_some() {
            self.label = label;
        }
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Announced;
        }
    }

    /// Apply one decoded packet and return the new count.
    ///
    /// Also accepted from `Connecting`: the channel is unordered and lossy,
    /// so the `hello` may arrive late or never.
    pub fn apply_sample(&mut self, msg: &SampleMessage, now: Instant) -> u64 {
        if self.phase == SessionPhase::Closed {
            return self.sample_count;
        }
        self.phase = SessionPhase::Active;
        self.last_seen = now;

        let a = &msg.axes;
        let s = &mut self.last_sample;
        s.ax = a.ax.or(s.ax);
        s.ay = a.ay.or(s.ay);
        s.az = a.az.or(s.az);
        s.gx = a.gx.or(s.gx);
        s.gy = a.gy.or(s.gy);
        s.gz = a.gz.or(s.gz);

        self.advance_count(msg.sequence);
        if self.highest_seq == Some(msg.sequence) {
            self.last_timestamp_ms = Some(msg.timestamp_ms);
        }
        self.sample_count
    }

    /// Unwrap the 16-bit sequence into a monotone count. Packets behind the
    /// highest sequence seen (reordered) leave the count alone.
    fn advance_count(&mut self, seq: u16) {
        match self.highest_seq {
            None => {
                self.sample_count = u64::from(seq) + 1;
                self.highest_seq = Some(seq);
            }
            Some(prev) => {
                let delta = seq.wrapping_sub(prev);
                if delta != 0 && delta < 0x8000 {
                    self.sample_count += u64::from(delta);
                    self.highest_seq = Some(seq);
                }
            }
        }
    }

    /// `ping`: liveness only, nothing else changes.
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// Whether viewers know about this session. Connecting sessions are
    /// kept out of snapshots so replicas converge with the event stream.
    pub fn is_visible(&self) -> bool {
        matches!(self.phase, SessionPhase::Announced | SessionPhase::Active)
    }

    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > window
    }

    pub fn record(&self) -> PeerRecord {
        let a = &self.last_sample;
        PeerRecord {
            peer_id: self.peer_id.clone(),
            label: self.label.clone(),
            count: self.sample_count,
            ax: a.ax,
            ay: a.ay,
            az: a.az,
            gx: a.gx,
            gy: a.gy,
            gz: a.gz,
        }
    }
}
