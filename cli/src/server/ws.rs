//! WebSocket endpoints: the live alert feed and the streamed video channel.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use scamwatch_core::{BroadcastHub, Envelope, Modality, Subscription};
use tracing::{debug, info, warn};

use super::handlers::write_temp;
use super::AppState;

pub async fn alerts(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| alert_session(socket, state.hub))
}

pub async fn video_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| video_session(socket, state))
}

/// Runs once the handshake has completed, so the subscriber is never half-open.
async fn alert_session(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (sink, inbound) = socket.split();
    run_alert_session(sink, inbound, hub).await;
}

async fn run_alert_session<S, R>(sink: S, mut inbound: R, hub: Arc<BroadcastHub>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let subscription = hub.connect();
    let id = subscription.id();
    info!(subscriber = id, "alert subscriber connected");

    let mut writer = tokio::spawn(forward_alerts(sink, subscription, Arc::clone(&hub)));

    // Inbound text is only keep-alive; watch for the close.
    loop {
        tokio::select! {
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    hub.disconnect(id);
    info!(subscriber = id, "client disconnected from alerts");
}

/// Drain one subscriber's queue into its socket.
async fn forward_alerts<S>(mut sink: S, mut subscription: Subscription, hub: Arc<BroadcastHub>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let id = subscription.id();

    while let Some(envelope) = subscription.recv().await {
        let payload = match serde_json::to_string(&*envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subscriber = id, error = %e, "failed to serialize envelope");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(payload)).await {
            warn!(subscriber = id, error = %e, "delivery failed, dropping subscriber");
            hub.disconnect(id);
            return;
        }
    }

    debug!(subscriber = id, "subscription closed");
}

async fn video_session(socket: WebSocket, state: AppState) {
    let (sink, inbound) = socket.split();
    run_video_session(sink, inbound, state).await;
}

/// Each binary message is a video chunk. The sender gets every full envelope
/// back; the alert feed only gets chunks showing a deepfake face.
async fn run_video_session<S, R>(mut sink: S, mut inbound: R, state: AppState)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    info!("video stream opened");

    while let Some(message) = inbound.next().await {
        let chunk = match message {
            Ok(Message::Binary(chunk)) => chunk,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let envelope = match write_temp(&chunk, ".mp4") {
            Ok(artifact) => state.orchestrator.analyze_video(artifact.path()).await,
            Err(e) => {
                warn!(error = %e, "failed to store video chunk");
                Envelope::error(Modality::Video, e.to_string())
            }
        };

        if envelope.is_deepfake_alert() {
            info!("deepfake face detected in video stream");
            state.hub.broadcast(envelope.clone());
        }

        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize envelope");
                continue;
            }
        };
        if sink.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }

    info!("client disconnected from video stream");
}
