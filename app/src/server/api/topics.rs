//! Topic API:
//!   GET    /api/topics                     – topics with state and unread count
//!   POST   /api/topics                     – add and subscribe
//!   GET    /api/topics/random-name         – suggested topic name
//!   DELETE /api/topics/{id}                – unsubscribe and delete
//!   PUT    /api/topics/{id}/display-name   – set or clear the alias
//!   GET    /api/topics/{id}/state          – connection state
//!   POST   /api/topics/{id}/resubscribe    – restart the stream

use axum::Json;
use axum::extract::{Path, State};
use ntfy_db::StoredTopic;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::app::SharedState;
use crate::services::topics::{self, AddTopic, TopicError};

use super::{ApiResult, err_json};

#[derive(Debug, Deserialize)]
pub struct DisplayNameBody {
    #[serde(default)]
    pub display_name: Option<String>,
}

fn topic_error(e: TopicError) -> (axum::http::StatusCode, Json<Value>) {
    let status = match &e {
        TopicError::NotFound(_) => 404,
        TopicError::Managed(_) => 403,
        TopicError::Invalid(_) => 400,
        TopicError::Db(_) => 500,
    };
    err_json(status, &e.to_string())
}

fn topic_json(state: &SharedState, topic: &StoredTopic, unread: i64) -> Value {
    json!({
        "id": topic.id,
        "name": topic.name,
        "display_name": topic.display_name,
        "title": topic.display_name.as_deref().unwrap_or(&topic.name),
        "server_url": topic.server_url,
        "username": topic.username,
        "is_managed": topic.is_managed,
        "created_at": topic.created_at,
        "connection": state.coordinator().connection_state(topic.id),
        "unread": unread,
    })
}

/// GET /api/topics
pub async fn list_topics(State(state): State<SharedState>) -> ApiResult {
    let stored = state
        .db()
        .list_topics()
        .map_err(|e| err_json(500, &format!("Failed to list topics: {e}")))?;
    let unread = state
        .db()
        .unread_counts()
        .map_err(|e| err_json(500, &format!("Failed to count unread: {e}")))?;

    let topics: Vec<Value> = stored
        .iter()
        .map(|t| topic_json(&state, t, unread.get(&t.id).copied().unwrap_or(0)))
        .collect();
    Ok(Json(json!({ "topics": topics })))
}

/// POST /api/topics
pub async fn add_topic(
    State(state): State<SharedState>,
    Json(body): Json<AddTopic>,
) -> ApiResult {
    let stored = topics::add_topic(&state, body).await.map_err(topic_error)?;
    Ok(Json(json!({
        "success": true,
        "topic": topic_json(&state, &stored, 0),
    })))
}

/// GET /api/topics/random-name
pub async fn random_name() -> ApiResult {
    Ok(Json(json!({ "name": topics::random_topic_name() })))
}

/// DELETE /api/topics/{id}
pub async fn delete_topic(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult {
    topics::delete_topic(&state, id).map_err(topic_error)?;
    Ok(Json(json!({ "success": true })))
}

/// PUT /api/topics/{id}/display-name
pub async fn set_display_name(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DisplayNameBody>,
) -> ApiResult {
    let topic =
        topics::rename_topic(&state, id, body.display_name.as_deref()).map_err(topic_error)?;
    let unread = state
        .db()
        .unread_count(id)
        .map_err(|e| err_json(500, &format!("Failed to count unread: {e}")))?;
    Ok(Json(json!({
        "success": true,
        "topic": topic_json(&state, &topic, unread),
    })))
}

/// GET /api/topics/{id}/state
pub async fn topic_state(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult {
    let status = state.coordinator().status(id);
    Ok(Json(json!({
        "topic_id": id,
        "connection": state.coordinator().connection_state(id),
        "failures": status.map_or(0, |s| s.failures),
        "retry_pending": status.is_some_and(|s| s.retry_pending),
    })))
}

/// POST /api/topics/{id}/resubscribe
pub async fn resubscribe(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult {
    topics::resubscribe(&state, id).map_err(topic_error)?;
    Ok(Json(json!({
        "success": true,
        "connection": state.coordinator().connection_state(id),
    })))
}
