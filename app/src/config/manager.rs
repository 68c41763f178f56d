//! SettingsManager: DB-backed settings with defaults, migration, and feature status.

use std::collections::HashMap;

use ntfy_db::Database;

use super::defaults::{DEFAULT_SETTINGS, SettingDef};
use super::validation::{split_list, validate_setting};
use super::{FeatureStatus, SettingInfo, SettingType};
use crate::managed::parse_managed_topics;

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

fn type_str(def: &SettingDef) -> &'static str {
    if def.secret { "secret" } else { "normal" }
}

fn setting_info(key: &str, value: &str, def: Option<&SettingDef>) -> SettingInfo {
    SettingInfo {
        key: key.to_string(),
        value: value.to_string(),
        setting_type: match def {
            Some(d) if d.secret => SettingType::Secret,
            _ => SettingType::Normal,
        },
        required: def.is_some_and(|d| d.required),
        description: def.map_or(String::new(), |d| d.description.to_string()),
        has_value: !value.is_empty(),
    }
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        anyhow::bail!("setting not found: {key}");
    }

    /// Set a setting value with validation.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;

        validate_setting(key, value)
            .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;

        self.db.set_setting(key, value, type_str(def))?;
        Ok(())
    }

    /// Validate every entry first, then store them all. Nothing is written
    /// when any entry is rejected.
    pub fn update_settings(&self, settings: &HashMap<String, String>) -> Result<(), anyhow::Error> {
        for (key, value) in settings {
            if !DEFAULT_SETTINGS.contains_key(key.as_str()) {
                anyhow::bail!("unknown setting key: {key}");
            }
            validate_setting(key, value)
                .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;
        }
        self.db.update_settings_bulk(settings)?;
        Ok(())
    }

    /// Get all settings, filling in defaults for missing keys.
    pub fn get_all_settings(&self) -> Result<HashMap<String, SettingInfo>, anyhow::Error> {
        let db_settings = self.db.get_all_settings()?;
        let mut result: HashMap<String, SettingInfo> = db_settings
            .iter()
            .map(|(key, value)| {
                let def = DEFAULT_SETTINGS.get(key.as_str());
                (key.clone(), setting_info(key, value, def))
            })
            .collect();

        for (key, def) in DEFAULT_SETTINGS.iter() {
            if !result.contains_key(*key) {
                result.insert(key.to_string(), setting_info(key, def.default, Some(def)));
            }
        }

        Ok(result)
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), anyhow::Error> {
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            self.db.set_setting(key, def.default, type_str(def))?;
        }
        Ok(())
    }

    /// Migrate settings from environment variables to DB (one-time).
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            if let Err(e) = validate_setting(key, &env_val) {
                tracing::warn!("Skipping env setting {key}: {e}");
                continue;
            }
            self.db.set_setting(key, &env_val, type_str(def))?;
            tracing::info!("Migrated setting from env: {key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
        }
        Ok(migrated)
    }

    /// Summarize what is configured and flag settings that have no effect.
    pub fn check_feature_status(&self) -> Result<FeatureStatus, anyhow::Error> {
        let mut status = FeatureStatus {
            notifications_enabled: self.get_setting("NOTIFICATION_ENABLED")? == "true",
            managed_topics: 0,
            missing_settings: Vec::new(),
            warnings: Vec::new(),
        };

        for (key, def) in DEFAULT_SETTINGS.iter() {
            if def.required && self.get_setting(key).unwrap_or_default().is_empty() {
                status.missing_settings.push(key.to_string());
            }
        }

        match parse_managed_topics(&self.get_setting("MANAGED_TOPICS")?) {
            Ok(topics) => status.managed_topics = topics.len(),
            Err(e) => status.warnings.push(format!("MANAGED_TOPICS is not valid JSON: {e}")),
        }

        if !status.notifications_enabled {
            status.warnings.push("Notifications are disabled".into());
        } else if self.get_setting("NOTIFICATION_MIN_PRIORITY")? == "5" {
            status
                .warnings
                .push("Only urgent (priority 5) messages will be presented".into());
        }

        let allowed = self.get_setting("NOTIFICATION_ALLOWED_TOPICS")?;
        let known: Vec<String> = self
            .db
            .list_topics()?
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        for id in split_list(&allowed) {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(id)) {
                status
                    .warnings
                    .push(format!("NOTIFICATION_ALLOWED_TOPICS names unknown topic {id}"));
            }
        }

        Ok(status)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
