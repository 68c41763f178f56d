use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::app::SharedState;
use crate::notification::types::MARK_READ_ACTION;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe_ws();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(16);

    // Send connection confirmation with the current state of every topic
    let client_id = uuid::Uuid::new_v4().to_string();
    let welcome = json!({
        "type": "connected",
        "data": { "clientId": client_id, "states": current_states(&state) }
    });
    if sender
        .send(Message::Text(welcome.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    tracing::info!("WebSocket client connected: {}", client_id);

    // Forward broadcast messages and direct replies to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(msg) => msg,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let cid = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(reply) = handle_client_message(&text, &state) {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        tracing::info!("WebSocket client disconnected: {}", cid);
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

fn current_states(state: &SharedState) -> Value {
    let coordinator = state.coordinator();
    coordinator
        .topic_ids()
        .into_iter()
        .map(|id| (id.to_string(), json!(coordinator.connection_state(id))))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Handle one client frame; returns a reply for this client only.
fn handle_client_message(text: &str, state: &SharedState) -> Option<String> {
    let msg: Value = serde_json::from_str(text).ok()?;
    match msg.get("type").and_then(|t| t.as_str()).unwrap_or("") {
        "ping" => Some(json!({ "type": "pong" }).to_string()),
        // Notification action reported by the shell
        "notification_action" => {
            let data = msg.get("data")?;
            let action = data.get("action").and_then(Value::as_str)?;
            let message_id = data.get("message_id").and_then(Value::as_str)?;
            if action != MARK_READ_ACTION {
                tracing::debug!(action, "Ignoring unknown notification action");
                return None;
            }
            match state.db().mark_message_read(message_id) {
                Ok(true) => state.broadcast_ws("message_read", json!({ "id": message_id })),
                Ok(false) => tracing::debug!(message_id, "Mark read for unknown message"),
                Err(e) => tracing::warn!(message_id, "Failed to mark message read: {e}"),
            }
            None
        }
        other => {
            tracing::debug!(kind = other, "Ignoring WebSocket client message");
            None
        }
    }
}
