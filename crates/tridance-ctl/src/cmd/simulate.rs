//! `simulate` — a synthetic phone.
//!
//! Negotiates a data channel with the hub exactly as the phone page does,
//! announces itself, then streams motion samples at a fixed rate with a
//! `ping` every few seconds. Samples are dropped, never queued, while the
//! channel's send buffer is over its limit.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::Notify;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use tridance_core::config::SignalingConfig;
use tridance_core::control::ControlFrame;
use tridance_core::signal::{AnswerResponse, IceMode, OfferRequest};
use tridance_core::wire::{
    deg_to_rad, encode, DATA_CHANNEL_LABEL, GATHER_TIMEOUT_MS, MAX_BUFFERED_BYTES,
    PING_INTERVAL_SECS,
};

use super::http::{post_json_body, Hub};

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub label: String,
    /// Samples per second.
    pub rate_hz: u32,
    /// Stop after this many samples; run until Ctrl-C when `None`.
    pub limit: Option<u32>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            label: "simulator".to_string(),
            rate_hz: 60,
            limit: None,
        }
    }
}

/// Standard gravity, m/s².
const G: f32 = 9.80665;

/// Accelerometer (m/s²) and gyroscope (deg/s) readings for a phone being
/// waved around.
pub fn synthetic_motion(t_secs: f64) -> ([f32; 3], [f32; 3]) {
    let t = t_secs as f32;
    let accel_g = [
        0.4 * (1.3 * t).sin(),
        0.4 * (0.9 * t).cos(),
        1.0 + 1.5 * (0.5 * t).sin().powi(3),
    ];
    let gyro = [90.0 * t.sin(), 45.0 * (0.7 * t).cos(), 30.0 * (0.2 * t).sin()];
    (accel_g.map(|a| a * G), gyro)
}

fn unix_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

pub async fn cmd_simulate(hub: &Hub, opts: SimulateOptions) -> Result<()> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media)?;
    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let ice = IceMode::for_host(&hub.host);
    let ice_servers = match ice {
        IceMode::Stun => vec![RTCIceServer {
            urls: SignalingConfig::default().stun_urls,
            ..Default::default()
        }],
        IceMode::None => Vec::new(),
    };
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration {
            ice_servers,
            ..Default::default()
        })
        .await?,
    );

    let dc = pc
        .create_data_channel(
            DATA_CHANNEL_LABEL,
            Some(RTCDataChannelInit {
                ordered: Some(false),
                max_retransmits: Some(0),
                ..Default::default()
            }),
        )
        .await?;

    let opened = Arc::new(Notify::new());
    {
        let opened = opened.clone();
        dc.on_open(Box::new(move || {
            opened.notify_one();
            Box::pin(async {})
        }));
    }

    // ── Signaling ────────────────────────────────────────────────────────────

    let offer = pc.create_offer(None).await?;
    let mut gather_complete = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await?;
    let _ = tokio::time::timeout(
        Duration::from_millis(GATHER_TIMEOUT_MS),
        gather_complete.recv(),
    )
    .await;
    let local = pc
        .local_description()
        .await
        .context("no local description after gathering")?;

    let request = OfferRequest {
        sdp: local.sdp,
        sdp_type: "offer".to_string(),
        label: Some(opts.label.clone()),
        ice,
    };
    let answer: AnswerResponse =
        post_json_body(&format!("{}/webrtc/offer", hub.origin()), &request).await?;
    pc.set_remote_description(RTCSessionDescription::answer(answer.sdp)?)
        .await?;

    tokio::time::timeout(OPEN_TIMEOUT, opened.notified())
        .await
        .context("data channel did not open")?;
    println!(
        "✓ Connected as {} ({})",
        opts.label,
        answer.peer_id.as_deref().unwrap_or("unknown id")
    );

    let hello = ControlFrame::Hello {
        label: Some(opts.label.clone()),
    };
    dc.send_text(serde_json::to_string(&hello)?).await?;

    // ── Stream ───────────────────────────────────────────────────────────────

    let period = Duration::from_secs_f64(1.0 / f64::from(opts.rate_hz.max(1)));
    let mut sample_tick = tokio::time::interval(period);
    let mut ping_tick = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_tick.tick().await;

    let started = std::time::Instant::now();
    let mut sequence: u32 = 0;
    let mut dropped: u64 = 0;

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                if opts.limit.is_some_and(|limit| sequence >= limit) {
                    break;
                }
                if dc.buffered_amount().await > MAX_BUFFERED_BYTES {
                    dropped += 1;
                    continue;
                }
                let (accel, gyro_deg) = synthetic_motion(started.elapsed().as_secs_f64());
                let gyro = gyro_deg.map(deg_to_rad);
                let packet = encode(sequence, unix_ms(), accel, gyro);
                dc.send(&Bytes::copy_from_slice(&packet)).await?;
                sequence = sequence.wrapping_add(1);
            }
            _ = ping_tick.tick() => {
                let ping = ControlFrame::Ping { t: Some(unix_ms()) };
                dc.send_text(serde_json::to_string(&ping)?).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("Sent {} samples ({} dropped while congested)", sequence, dropped);
    dc.close().await?;
    pc.close().await?;
    Ok(())
}
