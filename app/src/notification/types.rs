//! Notification type definitions.

use ntfy_db::StoredMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority at which a notification plays the critical sound.
pub const URGENT_PRIORITY: u8 = 5;

/// Sound played with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSound {
    Default,
    Critical,
}

/// Action set offered by the shell for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCategory {
    #[serde(rename = "NTFY_MESSAGE")]
    Message,
    #[serde(rename = "NTFY_MESSAGE_WITH_ACTIONS")]
    MessageWithActions,
}

/// Action id the shell reports back when the user marks a message read
/// from the notification.
pub const MARK_READ_ACTION: &str = "MARK_READ";

/// A notification ready for presentation by the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Request identifier; equal to the message id so repeats replace.
    pub identifier: String,
    pub title: String,
    pub body: String,
    pub sound: NotificationSound,
    pub category: NotificationCategory,
    /// Groups notifications per topic.
    pub thread_id: String,
    pub topic_id: Uuid,
    pub message_id: String,
    pub priority: u8,
    pub click: Option<String>,
}

impl NotificationRequest {
    pub fn from_message(message: &StoredMessage, topic_display_name: &str) -> Self {
        let title = message
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(topic_display_name)
            .to_string();
        let has_actions = message
            .actions
            .as_ref()
            .and_then(|a| a.as_array())
            .is_some_and(|a| !a.is_empty());

        Self {
            identifier: message.id.clone(),
            title,
            body: message.body.clone(),
            sound: if message.priority >= URGENT_PRIORITY {
                NotificationSound::Critical
            } else {
                NotificationSound::Default
            },
            category: if has_actions {
                NotificationCategory::MessageWithActions
            } else {
                NotificationCategory::Message
            },
            thread_id: message.topic_id.to_string(),
            topic_id: message.topic_id,
            message_id: message.id.clone(),
            priority: message.priority,
            click: message.click.clone(),
        }
    }

    /// `topic:<id>:priority:<n>`, matched by the host's focus filter.
    pub fn filter_criteria(&self) -> String {
        format!("topic:{}:priority:{}", self.topic_id, self.priority)
    }
}
