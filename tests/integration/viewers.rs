use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use tridance_core::replica::Replica;
use tridance_core::wire::encode;
use tridance_core::HubEvent;
use tridance_services::CloseReason;

use crate::*;

#[tokio::test]
async fn test_snapshot_is_first_frame() {
    let t = start_hub(64).await.unwrap();
    let announced = t.hub.register(Some("offer label".into()));
    t.hub.ingest_text(&announced, r#"{"kind":"hello","label":"iPhone"}"#);
    let _connecting = t.hub.register(None);

    let (_ws, first) = connect_viewer(&t).await.unwrap();
    match first {
        HubEvent::Snapshot { peers } => {
            assert_eq!(peers.len(), 1, "connecting sessions stay out of snapshots");
            assert_eq!(peers[0].peer_id, announced);
            assert_eq!(peers[0].label.as_deref(), Some("iPhone"));
            assert_eq!(peers[0].count, 0);
        }
        other => panic!("expected snapshot first, got {:?}", other),
    }
}

#[tokio::test]
async fn test_session_lifecycle_reaches_viewer() {
    let t = start_hub(64).await.unwrap();
    let (mut ws, first) = connect_viewer(&t).await.unwrap();
    assert_eq!(first, HubEvent::Snapshot { peers: vec![] });

    let id = t.hub.register(Some("Pixel".into()));
    t.hub.ingest_text(&id, r#"{"kind":"hello","label":"Pixel"}"#);
    t.hub
        .ingest_binary(&id, &encode(0, 1.0, [0.5, -0.5, 1.0], [0.0, 0.1, 0.2]));
    t.hub.ingest_text(&id, r#"{"kind":"ping","t":2.0}"#);
    t.hub.close(&id, CloseReason::ChannelClosed);

    match next_event(&mut ws).await.unwrap() {
        HubEvent::Hello { peer_id, label } => {
            assert_eq!(peer_id, id);
            assert_eq!(label.as_deref(), Some("Pixel"));
        }
        other => panic!("expected hello, got {:?}", other),
    }
    match next_event(&mut ws).await.unwrap() {
        HubEvent::Sample(update) => {
            assert_eq!(update.peer_id, id);
            assert_eq!(update.count, Some(1));
            assert_eq!(update.ax, Some(Some(0.5)));
        }
        other => panic!("expected sample, got {:?}", other),
    }
    // The ping produced nothing; the next event is the departure.
    assert_eq!(
        next_event(&mut ws).await.unwrap(),
        HubEvent::Left { peer_id: id }
    );
}

#[tokio::test]
async fn test_replica_converges_with_hub() {
    let t = start_hub(256).await.unwrap();
    let early = t.hub.register(None);
    t.hub
        .ingest_binary(&early, &encode(4, 0.0, [1.0, 2.0, 3.0], [0.0; 3]));

    let (mut ws, first) = connect_viewer(&t).await.unwrap();
    let mut replica = Replica::new();
    replica.apply(first);

    let late = t.hub.register(Some("late".into()));
    t.hub.ingest_text(&late, r#"{"kind":"hello","label":"late"}"#);
    t.hub
        .ingest_binary(&early, &encode(5, 0.0, [f32::NAN, 9.0, f32::NAN], [0.0; 3]));
    t.hub
        .ingest_binary(&late, &encode(0, 0.0, [0.1, 0.2, 0.3], [0.4, 0.5, 0.6]));
    for _ in 0..3 {
        replica.apply(next_event(&mut ws).await.unwrap());
    }

    let hub_view = t.hub.snapshot();
    let replica_view: Vec<_> = replica.entries().map(|e| e.record.clone()).collect();
    assert_eq!(replica_view, hub_view);
    assert_eq!(replica.get(&early).unwrap().record.ax, Some(1.0));
    assert_eq!(replica.get(&early).unwrap().record.ay, Some(9.0));
}

#[tokio::test]
async fn test_explicit_resync_returns_snapshot() {
    let t = start_hub(64).await.unwrap();
    let (mut ws, _) = connect_viewer(&t).await.unwrap();

    let id = t.hub.register(None);
    t.hub.ingest_text(&id, r#"{"kind":"hello","label":"a"}"#);
    let _ = next_event(&mut ws).await.unwrap();

    ws.send(Message::Text(r#"{"kind":"resync"}"#.into()))
        .await
        .unwrap();
    match next_event(&mut ws).await.unwrap() {
        HubEvent::Snapshot { peers } => {
            assert_eq!(peers.len(), 1);
            assert_eq!(peers[0].peer_id, id);
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lagging_viewer_is_disconnected() {
    let t = start_hub(4).await.unwrap();
    let (mut ws, _) = connect_viewer(&t).await.unwrap();

    // No await between ingests: the viewer task cannot drain its queue.
    let id = t.hub.register(None);
    for seq in 0..100u32 {
        t.hub
            .ingest_binary(&id, &encode(seq, 0.0, [0.0; 3], [0.0; 3]));
    }

    let close = loop {
        match tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(frame))) => break frame,
            Some(Ok(Message::Text(_))) => continue,
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => break None,
        }
    };
    if let Some(frame) = close {
        assert_eq!(u16::from(frame.code), 1013);
    }

    // Ingestion was never held back by the slow viewer.
    assert_eq!(t.hub.get(&id).unwrap().sample_count, 100);

    // A fresh connection resynchronises from a snapshot.
    let (_ws, first) = connect_viewer(&t).await.unwrap();
    match first {
        HubEvent::Snapshot { peers } => assert_eq!(peers[0].count, 100),
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stalled_viewer_is_disconnected() {
    let t = start_hub(1024).await.unwrap();
    // Read the snapshot, then never poll the socket again.
    let (_stalled, _) = connect_viewer(&t).await.unwrap();
    assert_eq!(t.hub.status().viewers, 1);

    let id = t.hub.register(None);
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
    let mut seq = 0u32;
    while t.hub.status().viewers > 0 {
        assert!(
            std::time::Instant::now() < deadline,
            "stalled viewer still attached after {} samples",
            seq
        );
        for _ in 0..16 {
            t.hub
                .ingest_binary(&id, &encode(seq, 0.0, [1.0, 2.0, 3.0], [0.1, 0.2, 0.3]));
            seq = seq.wrapping_add(1);
        }
        // Let the viewer task run; it must not be able to keep up forever.
        tokio::task::yield_now().await;
    }

    // Ingestion carried on regardless, and new viewers still attach.
    assert!(t.hub.get(&id).unwrap().sample_count > 0);
    let (_ws, first) = connect_viewer(&t).await.unwrap();
    assert!(matches!(first, HubEvent::Snapshot { .. }));
}
