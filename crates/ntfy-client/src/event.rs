//! Inbound events decoded from `data:` lines of the SSE stream.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIORITY: u8 = 3;

/// Event kind as sent by the server in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Open,
    Keepalive,
    Message,
    PollRequest,
}

/// One decoded unit from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    pub time: i64,
    pub event: EventKind,
    pub topic: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub click: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<MessageAction>>,
    #[serde(default)]
    pub attachment: Option<MessageAttachment>,
}

/// A user action attached to a message (`view`, `http`, `broadcast`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    pub action: String,
    pub label: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub clear: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub expires: Option<i64>,
    pub url: String,
}

impl InboundEvent {
    /// Decode the payload of a `data:` line.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn is_message(&self) -> bool {
        self.event == EventKind::Message
    }

    /// Priority in 1..=5; absent or out-of-range values map to the default.
    pub fn priority_or_default(&self) -> u8 {
        match self.priority {
            Some(p @ 1..=5) => p,
            _ => DEFAULT_PRIORITY,
        }
    }

    pub fn body(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    pub fn has_actions(&self) -> bool {
        self.actions.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// Server timestamp; falls back to the epoch for unrepresentable values.
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.time, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
