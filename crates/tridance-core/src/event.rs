//! Hub → viewer events — the JSON stream a dashboard consumes.
//!
//! The stream is ordered and reliable. Every event is a JSON object tagged
//! by `kind`. Field names are camelCase on the wire.
//!
//! Incremental updates distinguish three states per optional field:
//! key absent (keep the last known value), key present with `null` (clear
//! it), key present with a value (overwrite). Those fields are typed
//! `Option<Option<T>>` here; see [`present`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::wire::Axes;

/// One event on the hub→viewer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HubEvent {
    /// Full table. Sent once, first, on every viewer connection.
    Snapshot { peers: Vec<PeerRecord> },

    /// Incremental update for one peer.
    Sample(SampleUpdate),

    /// The peer's session ended. Terminal for that identifier.
    Left {
        #[serde(rename = "peerId")]
        peer_id: String,
    },

    /// Label announcement before (or without) sample data.
    Hello {
        #[serde(rename = "peerId")]
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },

    /// Any other text the phone sent, relayed verbatim in `payload`.
    Msg {
        #[serde(rename = "peerId")]
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// Any `kind` this build does not know. Applying it is a no-op.
    #[serde(other)]
    Unknown,
}

impl HubEvent {
    /// The peer this event concerns, if any.
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            HubEvent::Sample(u) => Some(&u.peer_id),
            HubEvent::Left { peer_id }
            | HubEvent::Hello { peer_id, .. }
            | HubEvent::Msg { peer_id, .. } => Some(peer_id),
            HubEvent::Snapshot { .. } | HubEvent::Unknown => None,
        }
    }
}

/// One row of a snapshot: the full known state of a peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub peer_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ax: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ay: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gz: Option<f32>,
}

impl PeerRecord {
    /// A peer with defaults: no label, zero count, every axis unknown.
    pub fn fresh(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            ..Self::default()
        }
    }

    pub fn axes(&self) -> Axes {
        Axes {
            ax: self.ax,
            ay: self.ay,
            az: self.az,
            gx: self.gx,
            gy: self.gy,
            gz: self.gz,
        }
    }
}

/// Incremental update. Only keys that are present overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleUpdate {
    pub peer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub label: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub ax: Option<Option<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub ay: Option<Option<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub az: Option<Option<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub gx: Option<Option<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub gy: Option<Option<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub gz: Option<Option<f32>>,
}

impl SampleUpdate {
    /// Build the update the hub emits for one applied packet: count always,
    /// axes only where the packet carried them.
    pub fn from_axes(peer_id: &str, label: Option<&str>, count: u64, axes: &Axes) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            label: label.map(|l| Some(l.to_string())),
            count: Some(count),
            ax: axes.ax.map(Some),
            ay: axes.ay.map(Some),
            az: axes.az.map(Some),
            gx: axes.gx.map(Some),
            gy: axes.gy.map(Some),
            gz: axes.gz.map(Some),
        }
    }
}

/// A key that is present deserializes to `Some`, even when its value is
/// `null`. Combined with `#[serde(default)]` an absent key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
