//! `/ws/stream`: the real-time ingestion endpoint.
//!
//! The reader loop is strictly sequential; the per-change pipeline is
//! spawned detached so a slow analysis never blocks the next frame, and a
//! client disconnect never cancels work already in flight.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, info_span, warn, Instrument};

use sensei_core::{FileChange, ServerMessage};

use crate::pipeline;
use crate::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, mut rx) = state.hub.connect();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: drains the hub queue onto the socket
    let writer_id = client_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
                debug!(client_id = %writer_id, "socket write failed, writer stopping");
                break;
            }
        }
    });

    state
        .hub
        .send(&client_id, ServerMessage::connected(client_id.clone()));

    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "socket read error");
                break;
            }
        };

        let change: FileChange = match serde_json::from_str(&text) {
            Ok(change) => change,
            Err(err) => {
                state.hub.send(
                    &client_id,
                    ServerMessage::error(format!("Invalid payload: {err}")),
                );
                continue;
            }
        };

        state
            .hub
            .send(&client_id, ServerMessage::received(&change.filename));

        let task_state = state.clone();
        let span = info_span!("pipeline", client_id = %client_id, filename = %change.filename);
        tokio::spawn(pipeline::run(task_state, change).instrument(span));
    }

    info!(client_id = %client_id, "stream session ended");
    state.hub.disconnect(&client_id);
    // Dropping the hub entry closed the queue; the writer drains and exits
    let _ = writer.await;
}
