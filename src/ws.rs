//! WebSocket transport.
//!
//! Frames JSON envelopes between connected clients and the event channel.
//! Each `/sessions/{id}/ws` connection subscribes to that session's topic;
//! inbound frames are schema-checked and dispatched to the orchestrator,
//! malformed ones are dropped with a warning. The wire framing itself is
//! nothing more than one JSON envelope per text message.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::events;
use crate::exec::Orchestrator;
use crate::{AppError, Result};

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
async fn health() -> &'static str {
    "ok"
}

/// Build the transport router.
#[must_use]
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions/{session_id}/ws", get(upgrade))
        .with_state(orchestrator)
}

/// Serve the transport until the cancellation token fires.
///
/// # Errors
///
/// Returns `AppError::Config` when the port cannot be bound, or
/// `AppError::Channel` when the server fails while running.
pub async fn serve(
    orchestrator: Arc<Orchestrator>,
    port: u16,
    ct: CancellationToken,
) -> Result<()> {
    let bind = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {bind}: {err}")))?;
    info!(%bind, "websocket transport listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(ct.cancelled_owned())
        .await
        .map_err(|err| AppError::Channel(format!("transport failed: {err}")))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, orchestrator, session_id))
}

/// Drive one client connection: bus → socket and socket → orchestrator.
async fn handle_socket(socket: WebSocket, orchestrator: Arc<Orchestrator>, session_id: String) {
    let topic = format!("session:{session_id}");
    let mut notifications = orchestrator.bus().subscribe(&topic);
    let (mut sink, mut stream) = socket.split();
    info!(session_id, "client connected");

    let outbound = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(envelope) => match serde_json::to_string(&envelope) {
                    Ok(frame) => {
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "dropping unserializable outbound frame"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, notifications lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(frame) => match events::decode_inbound(frame.as_str()) {
                Ok(envelope) if envelope.topic == topic => {
                    orchestrator.dispatch(envelope.command).await;
                }
                Ok(envelope) => {
                    warn!(topic = %envelope.topic, "frame for foreign topic dropped");
                }
                Err(err) => warn!(%err, "malformed frame dropped"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    outbound.abort();
    info!(session_id, "client disconnected");
}
