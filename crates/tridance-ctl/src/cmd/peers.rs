//! Peer listing and management commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{delete_json, get_json, Hub};
use super::watch::{format_axis, short_id};

#[derive(Deserialize)]
struct PeerInfo {
    peer_id: String,
    label: Option<String>,
    phase: String,
    count: u64,
    accel: [Option<f32>; 3],
    gyro: [Option<f32>; 3],
    last_timestamp_ms: Option<f64>,
    last_seen_secs: u64,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

fn triplet(values: &[Option<f32>; 3]) -> String {
    values
        .iter()
        .map(|v| format_axis(*v).text)
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn cmd_peers(hub: &Hub) -> Result<()> {
    let resp: PeersResponse = get_json(&hub.api("/peers")).await?;

    if resp.peers.is_empty() {
        println!("No phones connected.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        println!("  ┌─ {}", short_id(&p.peer_id));
        println!("  │  label     : {}", p.label.as_deref().unwrap_or("--"));
        println!("  │  phase     : {}", p.phase);
        println!("  │  count     : {}", p.count);
        println!("  │  accel     : {}", triplet(&p.accel));
        println!("  │  gyro      : {}", triplet(&p.gyro));
        println!("  └─ last seen : {}s ago", p.last_seen_secs);
    }

    Ok(())
}

pub async fn cmd_peer_inspect(hub: &Hub, peer_id: &str) -> Result<()> {
    let p: PeerInfo = get_json(&hub.api(&format!("/peers/{}", peer_id))).await?;

    println!("═══════════════════════════════════════");
    println!("  Peer Details");
    println!("═══════════════════════════════════════");
    println!("  ID        : {}", p.peer_id);
    println!("  Label     : {}", p.label.as_deref().unwrap_or("--"));
    println!("  Phase     : {}", p.phase);
    println!("  Count     : {}", p.count);
    println!("  Accel     : {}", triplet(&p.accel));
    println!("  Gyro      : {}", triplet(&p.gyro));
    match p.last_timestamp_ms {
        Some(ts) => println!("  Clock     : {:.0} ms", ts),
        None => println!("  Clock     : --"),
    }
    println!("  Last seen : {}s ago", p.last_seen_secs);
    println!("  Uptime    : {}s", p.uptime_secs);

    Ok(())
}

pub async fn cmd_peer_drop(hub: &Hub, peer_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct DropResponse {
        peer_id: String,
        dropped: bool,
    }

    let resp: DropResponse = delete_json(&hub.api(&format!("/peers/{}", peer_id))).await?;

    if resp.dropped {
        println!("✓ Peer dropped: {}", short_id(&resp.peer_id));
    } else {
        println!("Peer not found: {}", peer_id);
    }

    Ok(())
}
