//! Focus filter: drops notifications for topics or priorities the user has
//! silenced.

use std::collections::HashSet;

use uuid::Uuid;

use super::types::NotificationRequest;
use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct FocusFilter {
    pub enabled: bool,
    /// Empty means every topic is allowed.
    pub allowed_topics: HashSet<Uuid>,
    pub minimum_priority: u8,
}

impl Default for FocusFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_topics: HashSet::new(),
            minimum_priority: 1,
        }
    }
}

impl FocusFilter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.notification_enabled,
            allowed_topics: config.notification_allowed_topics.iter().copied().collect(),
            minimum_priority: config.notification_min_priority,
        }
    }

    pub fn allows_all_topics(&self) -> bool {
        self.allowed_topics.is_empty()
    }

    pub fn allows(&self, request: &NotificationRequest) -> bool {
        self.enabled
            && request.priority >= self.minimum_priority
            && (self.allows_all_topics() || self.allowed_topics.contains(&request.topic_id))
    }
}
