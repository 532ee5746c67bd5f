//! tridanced — TriDance IMU telemetry hub.
//!
//! Answers phones' WebRTC offers, folds their sample streams into one peer
//! table, and fans changes out to dashboard viewers over WebSocket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use tridance_core::config::TridanceConfig;
use tridance_services::{liveness, BroadcastHub, Signaling};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TridanceConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TridanceConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TridanceConfig::default()
    });
    tracing::info!(
        bind = %config.network.bind_addr,
        port = config.network.port,
        liveness_secs = config.hub.liveness_timeout_secs,
        "tridanced starting"
    );

    // Shared state
    let hub = BroadcastHub::shared(
        config.hub.viewer_buffer,
        Duration::from_secs(config.hub.liveness_timeout_secs),
    );
    let signaling = Arc::new(
        Signaling::new(hub.clone(), &config.signaling).context("failed to build WebRTC API")?,
    );

    // ── Shutdown ─────────────────────────────────────────────────────────────

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Tasks ────────────────────────────────────────────────────────────────

    let expiry_task = tokio::spawn(liveness::expiry_loop(
        signaling.clone(),
        Duration::from_secs(config.hub.sweep_interval_secs.max(1)),
        shutdown_tx.subscribe(),
    ));

    let api_task = {
        let state = tridance_api::ApiState::new(
            signaling.clone(),
            shutdown_tx.clone(),
            Duration::from_millis(config.hub.viewer_send_timeout_ms),
        );
        let bind_addr = config.network.bind_addr.clone();
        let port = config.network.port;
        tokio::spawn(async move {
            if let Err(e) = tridance_api::serve(state, &bind_addr, port).await {
                tracing::error!(error = %e, "api server failed");
            }
        })
    };

    let status_printer = {
        let hub = hub.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            interval.tick().await;
            loop {
                interval.tick().await;
                let status = hub.status();
                tracing::info!(
                    peers = status.peers,
                    connecting = status.connecting,
                    viewers = status.viewers,
                    samples = status.samples_total,
                    "hub status"
                );
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = expiry_task         => tracing::error!("expiry task exited: {:?}", r),
        r = api_task            => tracing::error!("api server exited: {:?}", r),
        r = status_printer      => tracing::error!("status printer exited: {:?}", r),
    }

    signaling.shutdown().await;
    Ok(())
}
