use reqwest::StatusCode;
use serde_json::{json, Value};

use tridance_core::wire::encode;
use tridance_core::HubEvent;

use crate::*;

#[tokio::test]
async fn test_status_counts_peers() {
    let t = start_hub(64).await.unwrap();
    let active = t.hub.register(None);
    t.hub
        .ingest_binary(&active, &encode(9, 0.0, [0.0; 3], [0.0; 3]));
    let _connecting = t.hub.register(None);

    let status: Value = reqwest::get(t.url("/api/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["peers"], 1);
    assert_eq!(status["connecting"], 1);
    assert_eq!(status["samples_total"], 10);
    assert_eq!(status["liveness_timeout_secs"], 15);
}

#[tokio::test]
async fn test_peer_listing_and_inspect() {
    let t = start_hub(64).await.unwrap();
    let id = t.hub.register(Some("Pixel".into()));
    t.hub
        .ingest_binary(&id, &encode(0, 5.0, [1.5, f32::NAN, 0.0], [0.0; 3]));

    let peers: Value = reqwest::get(t.url("/api/peers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(peers["peers"].as_array().unwrap().len(), 1);

    let peer: Value = reqwest::get(t.url(&format!("/api/peers/{}", id)))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(peer["peer_id"], json!(id));
    assert_eq!(peer["label"], "Pixel");
    assert_eq!(peer["phase"], "active");
    assert_eq!(peer["count"], 1);
    assert_eq!(peer["accel"], json!([1.5, null, 0.0]));

    let missing = reqwest::get(t.url("/api/peers/nope")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_drop_peer_emits_left() {
    let t = start_hub(64).await.unwrap();
    let id = t.hub.register(None);
    t.hub.ingest_text(&id, r#"{"kind":"hello"}"#);
    let (mut ws, _) = connect_viewer(&t).await.unwrap();

    let client = reqwest::Client::new();
    let resp: Value = client
        .delete(t.url(&format!("/api/peers/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["dropped"], true);
    assert_eq!(
        next_event(&mut ws).await.unwrap(),
        HubEvent::Left {
            peer_id: id.clone()
        }
    );
    assert!(t.hub.is_empty());

    let again: Value = client
        .delete(t.url(&format!("/api/peers/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["dropped"], false);
}

#[tokio::test]
async fn test_bad_offers_are_rejected() {
    let t = start_hub(64).await.unwrap();
    let client = reqwest::Client::new();

    let wrong_type = client
        .post(t.url("/webrtc/offer"))
        .json(&json!({"sdp": "v=0", "type": "answer"}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);

    let garbage = client
        .post(t.url("/webrtc/offer"))
        .json(&json!({"sdp": "not sdp at all", "type": "offer", "label": "x", "ice": "none"}))
        .send()
        .await
        .unwrap();
    assert!(!garbage.status().is_success());

    let malformed = client
        .post(t.url("/webrtc/offer"))
        .header("content-type", "application/json")
        .body("{")
        .send()
        .await
        .unwrap();
    assert!(malformed.status().is_client_error());

    // Nothing half-built is left behind.
    assert!(t.hub.is_empty());
    assert_eq!(t.signaling.connection_count(), 0);
}
