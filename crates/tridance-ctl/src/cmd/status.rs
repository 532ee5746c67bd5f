//! Hub status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{get_json, post_json, Hub};

#[derive(Deserialize)]
struct StatusResponse {
    peers: usize,
    connecting: usize,
    viewers: usize,
    samples_total: u64,
    connections: usize,
    liveness_timeout_secs: u64,
    uptime_secs: u64,
}

pub async fn cmd_status(hub: &Hub) -> Result<()> {
    let resp: StatusResponse = get_json(&hub.api("/status")).await?;

    println!("═══════════════════════════════════════");
    println!("  TriDance Hub Status");
    println!("═══════════════════════════════════════");
    println!("  Peers            : {}", resp.peers);
    println!("  Connecting       : {}", resp.connecting);
    println!("  Viewers          : {}", resp.viewers);
    println!("  Peer connections : {}", resp.connections);
    println!("  Samples (total)  : {}", resp.samples_total);
    println!("  Liveness window  : {}s", resp.liveness_timeout_secs);
    println!("  Uptime           : {}s", resp.uptime_secs);

    Ok(())
}

pub async fn cmd_shutdown(hub: &Hub) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        shutting_down: bool,
    }

    let resp: ShutdownResponse = post_json(&hub.api("/daemon/shutdown")).await?;
    if resp.shutting_down {
        println!("✓ Hub shutting down");
    } else {
        println!("Hub did not acknowledge shutdown");
    }
    Ok(())
}
