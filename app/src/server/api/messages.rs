//! Message API:
//!   GET    /api/topics/{id}/messages   – newest first, optional `?limit=`
//!   POST   /api/topics/{id}/read-all   – mark every message read
//!   POST   /api/messages/{id}/read     – mark one message read
//!   DELETE /api/messages/{id}          – delete one message
//!   GET    /api/unread-count           – per-topic and total unread counts

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::SharedState;

use super::{ApiResult, err_json};

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

/// GET /api/topics/{id}/messages
pub async fn topic_messages(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult {
    let topic = state
        .db()
        .get_topic(id)
        .map_err(|e| err_json(500, &format!("Failed to load topic: {e}")))?
        .ok_or_else(|| err_json(404, &format!("topic not found: {id}")))?;
    let messages = state
        .db()
        .get_topic_messages(id, query.limit.filter(|l| *l > 0))
        .map_err(|e| err_json(500, &format!("Failed to load messages: {e}")))?;

    let title = topic.display_name.as_deref().unwrap_or(&topic.name);
    let items: Vec<_> = messages
        .iter()
        .map(|m| {
            json!({
                "message": m,
                "display_title": m.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(title),
            })
        })
        .collect();
    Ok(Json(json!({ "topic_id": id, "messages": items })))
}

/// POST /api/topics/{id}/read-all
pub async fn mark_topic_read(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult {
    let updated = state
        .db()
        .mark_topic_read(id)
        .map_err(|e| err_json(500, &format!("Failed to mark read: {e}")))?;
    if updated > 0 {
        state.broadcast_ws("topic_read", json!({ "topic_id": id }));
    }
    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// POST /api/messages/{id}/read
pub async fn mark_read(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let found = state
        .db()
        .mark_message_read(&id)
        .map_err(|e| err_json(500, &format!("Failed to mark read: {e}")))?;
    if !found {
        return Err(err_json(404, &format!("message not found: {id}")));
    }
    state.broadcast_ws("message_read", json!({ "id": id }));
    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/messages/{id}
pub async fn delete_message(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let found = state
        .db()
        .delete_message(&id)
        .map_err(|e| err_json(500, &format!("Failed to delete message: {e}")))?;
    if !found {
        return Err(err_json(404, &format!("message not found: {id}")));
    }
    Ok(Json(json!({ "success": true })))
}

/// GET /api/unread-count
pub async fn unread_count(State(state): State<SharedState>) -> ApiResult {
    let per_topic = state
        .db()
        .unread_counts()
        .map_err(|e| err_json(500, &format!("Failed to count unread: {e}")))?;
    let total: i64 = per_topic.values().sum();
    Ok(Json(json!({ "total": total, "topics": per_topic })))
}
