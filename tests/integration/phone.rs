//! A real data channel from an in-test phone to the hub.
//!
//! Skips when ICE cannot connect on this host (no usable non-loopback
//! interface, sandboxed network).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use tridance_core::HubEvent;
use tridance_core::signal::{AnswerResponse, IceMode, OfferRequest};
use tridance_core::wire::{DATA_CHANNEL_LABEL, encode};

use crate::*;

async fn phone_peer() -> anyhow::Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media)?;
    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();
    Ok(Arc::new(
        api.new_peer_connection(RTCConfiguration::default()).await?,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_phone_streams_through_data_channel() {
    let t = start_hub(256).await.unwrap();
    let (mut ws, _) = connect_viewer(&t).await.unwrap();

    let pc = phone_peer().await.unwrap();
    let dc = pc
        .create_data_channel(
            DATA_CHANNEL_LABEL,
            Some(RTCDataChannelInit {
                ordered: Some(false),
                max_retransmits: Some(0),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    let opened = Arc::new(Notify::new());
    {
        let opened = opened.clone();
        dc.on_open(Box::new(move || {
            opened.notify_one();
            Box::pin(async {})
        }));
    }

    let offer = pc.create_offer(None).await.unwrap();
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await.unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(2), gathered.recv()).await;
    let local = pc.local_description().await.unwrap();

    let answer: AnswerResponse = reqwest::Client::new()
        .post(t.url("/webrtc/offer"))
        .json(&OfferRequest {
            sdp: local.sdp,
            sdp_type: "offer".into(),
            label: Some("test-phone".into()),
            ice: IceMode::None,
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answer.sdp_type, "answer");
    let peer_id = answer.peer_id.clone().expect("answer carries the peer id");
    assert_eq!(t.hub.len(), 1);

    pc.set_remote_description(RTCSessionDescription::answer(answer.sdp).unwrap())
        .await
        .unwrap();

    if tokio::time::timeout(Duration::from_secs(10), opened.notified())
        .await
        .is_err()
    {
        eprintln!("SKIP: data channel did not open — ICE unavailable on this host");
        let _ = pc.close().await;
        return;
    }

    dc.send_text(r#"{"kind":"hello","label":"test-phone"}"#.to_string())
        .await
        .unwrap();
    match next_event(&mut ws).await.unwrap() {
        HubEvent::Hello { peer_id: id, label } => {
            assert_eq!(id, peer_id);
            assert_eq!(label.as_deref(), Some("test-phone"));
        }
        other => panic!("expected hello, got {:?}", other),
    }

    let packet = encode(41, 1234.0, [0.25, 0.5, 1.0], [0.0, 0.0, 0.125]);
    dc.send(&Bytes::copy_from_slice(&packet)).await.unwrap();
    match next_event(&mut ws).await.unwrap() {
        HubEvent::Sample(update) => {
            assert_eq!(update.peer_id, peer_id);
            assert_eq!(update.count, Some(42));
            assert_eq!(update.gz, Some(Some(0.125)));
        }
        other => panic!("expected sample, got {:?}", other),
    }

    // Channel close, or failing that the connection state change, ends
    // the session.
    dc.close().await.unwrap();
    pc.close().await.unwrap();
    assert_eq!(
        next_event_within(&mut ws, Duration::from_secs(40)).await.unwrap(),
        HubEvent::Left { peer_id }
    );
}
