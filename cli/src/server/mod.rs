//! HTTP/WebSocket gateway around the orchestrator and the broadcast hub.

mod handlers;
mod ws;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use scamwatch_core::{BroadcastHub, Config, Orchestrator};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, hub: Arc<BroadcastHub>) -> Self {
        Self { orchestrator, hub }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze/text", post(handlers::analyze_text))
        .route("/analyze/audio", post(handlers::analyze_audio))
        .route("/analyze/video", post(handlers::analyze_video))
        .route("/analyze/frame", post(handlers::analyze_frame))
        .route("/ws/video", get(ws::video_stream))
        .route("/ws/alerts", get(ws::alerts))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state, config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;

    info!(address = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
