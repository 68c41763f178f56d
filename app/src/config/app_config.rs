//! Runtime application configuration loaded from DB + environment overrides.

use std::time::Duration;

use uuid::Uuid;

use super::manager::SettingsManager;
use super::validation::split_list;
use crate::managed::{ManagedTopicConfig, parse_managed_topics};

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub default_server_url: String,
    pub notification_enabled: bool,
    pub notification_min_priority: u8,
    pub notification_allowed_topics: Vec<Uuid>,
    pub message_retention_days: u32,
    pub keepalive_timeout_secs: u64,
    pub managed_topics: Vec<ManagedTopicConfig>,
    pub launch_at_login: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8093,
            default_server_url: ntfy_client::DEFAULT_SERVER_URL.into(),
            notification_enabled: true,
            notification_min_priority: 1,
            notification_allowed_topics: Vec::new(),
            message_retention_days: 30,
            keepalive_timeout_secs: 120,
            managed_topics: Vec::new(),
            launch_at_login: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String { sm.get_setting(key).unwrap_or_default() };
        let defaults = Self::default();

        let mut server_port = g("SERVER_PORT").parse().unwrap_or(defaults.server_port);
        if let Ok(v) = std::env::var("SERVER_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                server_port = p;
            }
        }

        let default_server_url = {
            let url = g("DEFAULT_SERVER_URL");
            if url.trim().is_empty() {
                defaults.default_server_url
            } else {
                url.trim().trim_end_matches('/').to_string()
            }
        };

        let notification_allowed_topics = split_list(&g("NOTIFICATION_ALLOWED_TOPICS"))
            .filter_map(|id| match Uuid::parse_str(id) {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(id, "Ignoring invalid topic id in NOTIFICATION_ALLOWED_TOPICS");
                    None
                }
            })
            .collect();

        let managed_topics = match parse_managed_topics(&g("MANAGED_TOPICS")) {
            Ok(topics) => topics,
            Err(e) => {
                tracing::warn!("Ignoring invalid MANAGED_TOPICS: {e}");
                Vec::new()
            }
        };

        Ok(Self {
            server_port,
            default_server_url,
            notification_enabled: g("NOTIFICATION_ENABLED") != "false",
            notification_min_priority: g("NOTIFICATION_MIN_PRIORITY")
                .parse::<u8>()
                .map(|p| p.clamp(1, 5))
                .unwrap_or(defaults.notification_min_priority),
            notification_allowed_topics,
            message_retention_days: g("MESSAGE_RETENTION_DAYS")
                .parse()
                .unwrap_or(defaults.message_retention_days),
            keepalive_timeout_secs: g("KEEPALIVE_TIMEOUT_SECS")
                .parse::<u64>()
                .map(|s| s.clamp(10, 3600))
                .unwrap_or(defaults.keepalive_timeout_secs),
            managed_topics,
            launch_at_login: g("LAUNCH_AT_LOGIN") == "true",
        })
    }

    /// Reload from the settings manager, keeping the current values on error.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    /// Retention window in seconds; `None` keeps messages forever.
    pub fn retention_secs(&self) -> Option<i64> {
        (self.message_retention_days > 0).then(|| i64::from(self.message_retention_days) * 86_400)
    }
}

#[cfg(test)]
mod tests {
    use ntfy_db::Database;

    use super::*;

    fn manager() -> SettingsManager {
        let sm = SettingsManager::new(Database::open_in_memory().unwrap());
        sm.initialize_defaults().unwrap();
        sm
    }

    #[test]
    fn loads_defaults() {
        let config = AppConfig::load(&manager()).unwrap();
        assert_eq!(config.default_server_url, "https://ntfy.sh");
        assert!(config.notification_enabled);
        assert_eq!(config.notification_min_priority, 1);
        assert!(config.notification_allowed_topics.is_empty());
        assert_eq!(config.keepalive_timeout(), Duration::from_secs(120));
        assert_eq!(config.retention_secs(), Some(30 * 86_400));
        assert!(config.managed_topics.is_empty());
    }

    #[test]
    fn reads_stored_values() {
        let sm = manager();
        let id = Uuid::new_v4();
        sm.set_setting("DEFAULT_SERVER_URL", "https://ntfy.example.com/").unwrap();
        sm.set_setting("NOTIFICATION_ALLOWED_TOPICS", &id.to_string()).unwrap();
        sm.set_setting("NOTIFICATION_MIN_PRIORITY", "4").unwrap();
        sm.set_setting("MESSAGE_RETENTION_DAYS", "0").unwrap();
        sm.set_setting("MANAGED_TOPICS", r#"[{"name":"corp"}]"#).unwrap();

        let config = AppConfig::load(&sm).unwrap();
        assert_eq!(config.default_server_url, "https://ntfy.example.com");
        assert_eq!(config.notification_allowed_topics, vec![id]);
        assert_eq!(config.notification_min_priority, 4);
        assert_eq!(config.retention_secs(), None);
        assert_eq!(config.managed_topics.len(), 1);
        assert_eq!(config.managed_topics[0].name, "corp");
    }
}
