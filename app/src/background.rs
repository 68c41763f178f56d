//! Background task loops: state push, power events, message retention.

use std::time::Duration;

use ntfy_client::PowerEvent;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;
use crate::services::topics::all_client_topics;

const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Push every connection state transition to WebSocket clients.
pub async fn state_broadcast_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    let mut changes = state.coordinator().state_changes();

    loop {
        let change = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            change = changes.recv() => change,
        };
        match change {
            Ok(change) => state.broadcast_ws(
                "connection_state",
                json!({ "topic_id": change.topic_id, "state": change.state }),
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "State broadcast lagged; shell may show stale states");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::info!("State broadcast loop stopped");
}

/// Drive sleep/wake notifications into the coordinator. On wake the topic
/// list is re-read from the store.
pub async fn power_event_loop(state: SharedState, events: mpsc::Receiver<PowerEvent>) {
    let db = state.db().clone();
    let topics = move || {
        all_client_topics(&db).unwrap_or_else(|e| {
            tracing::error!("Failed to load topics for wake: {e}");
            Vec::new()
        })
    };
    ntfy_client::drive_power_events(
        state.coordinator().clone(),
        events,
        topics,
        state.shutdown_token().clone(),
    )
    .await;
    tracing::info!("Power event loop stopped");
}

/// Delete messages older than the retention window, hourly.
pub async fn retention_cleanup_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();

    // Wait for initial startup
    if sleep_or_cancel(&shutdown_token, Duration::from_secs(30)).await {
        tracing::info!("Retention cleanup loop stopped (shutdown)");
        return;
    }

    loop {
        let retention = state.config().await.retention_secs();
        if let Some(secs) = retention {
            let cutoff = chrono::Utc::now().timestamp() - secs;
            match state.db().cleanup_messages_before(cutoff) {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, "Expired messages removed"),
                Err(e) => tracing::warn!("Message cleanup failed: {e}"),
            }
        }

        if sleep_or_cancel(&shutdown_token, RETENTION_INTERVAL).await {
            tracing::info!("Retention cleanup loop stopped (shutdown)");
            return;
        }
    }
}
