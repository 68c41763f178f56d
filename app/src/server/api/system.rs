//! System API:
//!   POST /api/system/sleep   – host is about to sleep
//!   POST /api/system/wake    – host woke up
//!   POST /api/reconnect-all  – restart every stream with fresh counters

use axum::Json;
use axum::extract::State;
use ntfy_client::PowerEvent;
use serde_json::json;

use crate::app::SharedState;
use crate::services::topics::all_client_topics;

use super::{ApiResult, err_json};

async fn forward(state: &SharedState, event: PowerEvent) -> ApiResult {
    state
        .send_power_event(event)
        .await
        .map_err(|e| err_json(503, &e.to_string()))?;
    Ok(Json(json!({ "success": true, "event": event })))
}

/// POST /api/system/sleep
pub async fn will_sleep(State(state): State<SharedState>) -> ApiResult {
    forward(&state, PowerEvent::WillSleep).await
}

/// POST /api/system/wake
pub async fn did_wake(State(state): State<SharedState>) -> ApiResult {
    forward(&state, PowerEvent::DidWake).await
}

/// POST /api/reconnect-all
pub async fn reconnect_all(State(state): State<SharedState>) -> ApiResult {
    let topics = all_client_topics(state.db())
        .map_err(|e| err_json(500, &format!("Failed to list topics: {e}")))?;
    let started = state.coordinator().reconnect_all(&topics);
    Ok(Json(json!({ "success": true, "started": started })))
}
