pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Every route the hub serves: signaling, the viewer stream, and the
/// JSON status API.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/peers", get(handlers::handle_peers))
        .route(
            "/peers/{id}",
            get(handlers::handle_peer_inspect).delete(handlers::handle_peer_drop),
        )
        .route("/daemon/shutdown", post(handlers::handle_shutdown));

    Router::new()
        .route("/webrtc/offer", post(handlers::handle_offer))
        .route("/ws", get(handlers::handle_viewer_ws))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: ApiState, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    serve_listener(state, listener).await
}

/// Serve on an already-bound listener (port 0 in tests).
pub async fn serve_listener(state: ApiState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "hub listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
