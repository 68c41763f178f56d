use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::{api, websocket};
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // --- Core ---
        .route("/status", get(status_handler))
        .route("/ws", get(websocket::ws_handler))
        // --- Topics ---
        .route("/api/topics", get(api::topics::list_topics).post(api::topics::add_topic))
        .route("/api/topics/random-name", get(api::topics::random_name))
        .route("/api/topics/{id}", delete(api::topics::delete_topic))
        .route("/api/topics/{id}/display-name", put(api::topics::set_display_name))
        .route("/api/topics/{id}/state", get(api::topics::topic_state))
        .route("/api/topics/{id}/resubscribe", post(api::topics::resubscribe))
        // --- Messages ---
        .route("/api/topics/{id}/messages", get(api::messages::topic_messages))
        .route("/api/topics/{id}/read-all", post(api::messages::mark_topic_read))
        .route("/api/messages/{id}/read", post(api::messages::mark_read))
        .route("/api/messages/{id}", delete(api::messages::delete_message))
        .route("/api/unread-count", get(api::messages::unread_count))
        // --- System ---
        .route("/api/system/sleep", post(api::system::will_sleep))
        .route("/api/system/wake", post(api::system::did_wake))
        .route("/api/reconnect-all", post(api::system::reconnect_all))
        // --- Settings ---
        .route("/api/settings", get(api::settings::get_settings).put(api::settings::update_settings))
        // --- Middleware ---
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler(State(state): State<SharedState>) -> Json<Value> {
    let coordinator = state.coordinator();
    let topic_ids = coordinator.topic_ids();
    let connected = topic_ids
        .iter()
        .filter(|id| coordinator.connection_state(**id).is_connected())
        .count();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "topics": topic_ids.len(),
        "connected": connected,
        "data_dir": state.data_dir().display().to_string(),
    }))
}
