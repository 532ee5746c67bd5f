//! Signaling payloads — the offer/answer exchange over HTTP.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// NAT-traversal mode requested by the phone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceMode {
    /// Use STUN servers while gathering candidates.
    #[default]
    Stun,
    /// Host candidates only.
    None,
}

impl IceMode {
    /// Use STUN unless the hub is reached through a loopback address.
    pub fn for_host(host: &str) -> Self {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.eq_ignore_ascii_case("localhost") {
            return IceMode::None;
        }
        match bare.parse::<IpAddr>() {
            Ok(ip) if ip.is_loopback() => IceMode::None,
            _ => IceMode::Stun,
        }
    }
}

/// `POST /webrtc/offer` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub ice: IceMode,
}

/// `POST /webrtc/offer` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
    #[serde(rename = "peerId", default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
}
