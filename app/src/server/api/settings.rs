//! Settings management API:
//!   GET /api/settings – all settings + feature status
//!   PUT /api/settings – validate and store a batch, then reload the config

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::app::SharedState;
use crate::config::{SettingInfo, SettingsManager};
use crate::managed::sync_managed_topics;
use crate::services::topics::to_client_topic;

use super::{ApiResult, err_json};

fn settings_payload(sm: &SettingsManager) -> Result<Value, (axum::http::StatusCode, Json<Value>)> {
    let all: HashMap<String, SettingInfo> = sm
        .get_all_settings()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    let status = sm
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;
    Ok(json!({
        "settings": all,
        "status": status,
    }))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    Ok(Json(settings_payload(&sm)?))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(body): Json<HashMap<String, String>>,
) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());
    sm.update_settings(&body)
        .map_err(|e| err_json(400, &e.to_string()))?;

    // Reload runtime config
    state
        .reload_config()
        .await
        .map_err(|e| err_json(500, &format!("Failed to reload config: {e}")))?;

    if body.contains_key("MANAGED_TOPICS") {
        let (managed, default_server) = {
            let config = state.config().await;
            (config.managed_topics.clone(), config.default_server_url.clone())
        };
        let sync = sync_managed_topics(state.db(), &managed, &default_server)
            .map_err(|e| err_json(500, &format!("Failed to sync managed topics: {e}")))?;
        for topic in &sync.created {
            if let Err(e) = state.coordinator().subscribe(to_client_topic(topic)) {
                tracing::warn!(topic_id = %topic.id, "Managed topic not subscribed: {e}");
            }
        }
    }

    let mut payload = settings_payload(&sm)?;
    payload["success"] = json!(true);
    payload["message"] = json!(format!("Updated {} setting(s) successfully", body.len()));
    Ok(Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::app::test_state;
    use crate::server::api::test_util::status_of;

    fn batch(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn get_returns_all_settings() {
        let (state, _channels) = test_state();
        let Json(v) = get_settings(State(state)).await.unwrap();
        assert_eq!(v["settings"]["DEFAULT_SERVER_URL"]["value"], "https://ntfy.sh");
        assert_eq!(v["status"]["notifications_enabled"], true);
    }

    #[tokio::test]
    async fn update_reloads_config() {
        let (state, _channels) = test_state();
        let Json(v) = update_settings(
            State(state.clone()),
            Json(batch(&[("NOTIFICATION_MIN_PRIORITY", "4")])),
        )
        .await
        .unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(state.config().await.notification_min_priority, 4);
    }

    #[tokio::test]
    async fn invalid_value_is_rejected() {
        let (state, _channels) = test_state();
        let result = update_settings(
            State(state.clone()),
            Json(batch(&[("NOTIFICATION_MIN_PRIORITY", "9")])),
        )
        .await;
        assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
        assert_eq!(state.config().await.notification_min_priority, 1);
    }

    #[tokio::test]
    async fn managed_topics_are_created_and_subscribed() {
        let (state, _channels) = test_state();
        let Json(v) = update_settings(
            State(state.clone()),
            Json(batch(&[(
                "MANAGED_TOPICS",
                r#"[{"name":"corp","serverURL":"http://127.0.0.1:9"}]"#,
            )])),
        )
        .await
        .unwrap();
        assert_eq!(v["success"], true);
        let topics = state.db().list_topics().unwrap();
        assert_eq!(topics.len(), 1);
        assert!(topics[0].is_managed);
        assert_eq!(state.coordinator().topic_ids(), vec![topics[0].id]);
        state.coordinator().disconnect_all();
    }
}
