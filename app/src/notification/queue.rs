//! Notification queue and worker.
//!
//! Requests are presented one at a time, in arrival order, by broadcasting
//! them to the shell over the WebSocket.

use std::sync::LazyLock;

use tokio::sync::{RwLock, mpsc};

use crate::app::SharedState;

use super::types::NotificationRequest;

const QUEUE_CAPACITY: usize = 100;

static NOTIF_TX: LazyLock<RwLock<Option<mpsc::Sender<NotificationRequest>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Start the notification queue worker.
pub async fn start_worker(state: SharedState) {
    let (tx, rx) = mpsc::channel::<NotificationRequest>(QUEUE_CAPACITY);
    {
        let mut slot = NOTIF_TX.write().await;
        *slot = Some(tx);
    }

    tokio::spawn(worker_loop(state, rx));
    tracing::info!("Notification queue worker started");
}

/// Enqueue a notification for presentation.
pub async fn enqueue(notification: NotificationRequest) -> Result<(), String> {
    let tx_guard = NOTIF_TX.read().await;
    let tx = tx_guard
        .as_ref()
        .ok_or_else(|| "Notification queue not initialized".to_string())?;

    tx.try_send(notification)
        .map_err(|e| format!("Notification queue full or closed: {e}"))?;

    Ok(())
}

/// Close the queue sender to stop the worker loop.
pub async fn close() {
    let mut slot = NOTIF_TX.write().await;
    *slot = None;
}

async fn worker_loop(state: SharedState, mut rx: mpsc::Receiver<NotificationRequest>) {
    while let Some(request) = rx.recv().await {
        present(&state, &request);
    }

    tracing::info!("Notification queue worker stopped");
}

fn present(state: &SharedState, request: &NotificationRequest) {
    tracing::info!(
        topic_id = %request.topic_id,
        message_id = %request.message_id,
        criteria = %request.filter_criteria(),
        "Presenting notification"
    );
    match serde_json::to_value(request) {
        Ok(data) => state.broadcast_ws("notification", data),
        Err(e) => tracing::warn!("Failed to encode notification: {e}"),
    }
}
