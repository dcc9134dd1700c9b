//! WebSocket Realtime Updates
//!
//! `GET /ws/:resource_id` attaches the socket to the relay hub for that
//! resource. Bus events for the resource arrive as text frames; text frames
//! the client sends are relayed to the other subscribers of the same
//! resource. Detaching happens when the subscriber handle drops, whichever
//! side ends the connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use switchyard_events::RelayHub;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::telemetry::METRICS;

/// GET /ws/:resource_id
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(resource_id): Path<String>,
    State(relay): State<RelayHub>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, relay, resource_id))
}

async fn handle_socket(socket: WebSocket, relay: RelayHub, resource_id: String) {
    // The welcome line arrives on the handle once the relay is bound to the bus.
    let mut handle = match relay.attach(&resource_id) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(resource_id = %resource_id, error = %e, "Relay attach failed, closing WebSocket");
            let _ = socket.close().await;
            return;
        }
    };

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.ws_connected();
    }

    let (mut sender, mut receiver) = socket.split();
    let subscriber_id = handle.id();
    info!(resource_id = %resource_id, subscriber_id = %subscriber_id, "WebSocket connected");

    let peers = relay.clone();
    let peer_resource = resource_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let delivered = peers.relay_direct(&peer_resource, subscriber_id, &text);
                    debug!(resource_id = %peer_resource, delivered, "Relayed text to peers");
                }
                Ok(Message::Close(_)) => {
                    debug!(resource_id = %peer_resource, "Client sent close frame");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    debug!(resource_id = %peer_resource, len = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => {
                    warn!(resource_id = %peer_resource, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            message = handle.recv() => {
                match message {
                    Some(text) => {
                        if let Err(e) = sender.send(Message::Text(text)).await {
                            debug!(resource_id = %resource_id, error = %e, "Send failed, closing connection");
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = &mut recv_task => {
                debug!(resource_id = %resource_id, "Receiver task finished");
                break;
            }
        }
    }

    recv_task.abort();
    drop(handle);

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.ws_disconnected();
    }
    info!(resource_id = %resource_id, subscriber_id = %subscriber_id, "WebSocket disconnected");
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/:resource_id", get(ws_handler))
        .with_state(state)
}
