//! WebSocket endpoints: signaling relay and detection push channel.
//!
//! Each accepted socket gets a reader loop plus a writer task draining
//! its outbound queue, so hub fan-out never blocks on a slow socket.
//! Disconnects (reader ends, writer fails) promptly unregister the
//! connection from whichever registry holds it.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::hub::next_conn_id;
use crate::state::AppState;

/// `GET /ws` — WebRTC signaling relay.
pub async fn signaling_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_signaling(socket, state))
}

/// `GET /ws/detection` — detection result push channel.
pub async fn detection_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_detection(socket, state))
}

async fn handle_signaling(socket: WebSocket, state: AppState) {
    let id = next_conn_id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.peers.register(id, tx);
    debug!(conn = id, "signaling peer connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            // Opaque negotiation content; relayed verbatim to every
            // other peer, never echoed back to the sender.
            Message::Text(text) => {
                state.peers.broadcast(&text, Some(id));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.peers.unregister(id);
    writer.abort();
    debug!(conn = id, "signaling peer disconnected");
}

async fn handle_detection(socket: WebSocket, state: AppState) {
    let id = next_conn_id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.subscribers.register(id, tx);
    debug!(conn = id, "detection subscriber connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Receive-only channel from the hub's perspective: inbound frames
    // are keepalive traffic, drained and discarded.
    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    state.subscribers.unregister(id);
    writer.abort();
    debug!(conn = id, "detection subscriber disconnected");
}
