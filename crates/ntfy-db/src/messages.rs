//! Received message history and read state.

use std::collections::HashMap;

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Database, DbError, uuid_column};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub topic_id: Uuid,
    pub title: Option<String>,
    pub body: String,
    pub priority: u8,
    pub tags: Vec<String>,
    pub click: Option<String>,
    pub actions: Option<serde_json::Value>,
    pub attachment: Option<serde_json::Value>,
    pub is_read: bool,
    /// Server timestamp (unix seconds).
    pub received_at: i64,
}

/// A message as decoded from the stream, before it is stored.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub topic_id: Uuid,
    pub title: Option<&'a str>,
    pub body: &'a str,
    pub priority: u8,
    pub tags: &'a [String],
    pub click: Option<&'a str>,
    pub actions: Option<serde_json::Value>,
    pub attachment: Option<serde_json::Value>,
    pub received_at: i64,
}

const MESSAGE_COLUMNS: &str = "id, topic_id, title, body, priority, tags_json, click, \
     actions_json, attachment_json, is_read, received_at";

fn json_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let tags_json: String = row.get(5)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        topic_id: uuid_column(row, 1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        priority: row.get(4)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        click: row.get(6)?,
        actions: json_column(row, 7)?,
        attachment: json_column(row, 8)?,
        is_read: row.get(9)?,
        received_at: row.get(10)?,
    })
}

fn to_json_text(value: &Option<serde_json::Value>) -> Result<Option<String>, DbError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::InvalidData(e.to_string()))
}

impl Database {
    /// Store a message. Returns false when a message with the same id was
    /// already stored.
    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<bool, DbError> {
        let tags_json =
            serde_json::to_string(msg.tags).map_err(|e| DbError::InvalidData(e.to_string()))?;
        let actions_json = to_json_text(&msg.actions)?;
        let attachment_json = to_json_text(&msg.attachment)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO messages
                    (id, topic_id, title, body, priority, tags_json, click,
                     actions_json, attachment_json, is_read, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, false, ?10)",
                rusqlite::params![
                    msg.id,
                    msg.topic_id.to_string(),
                    msg.title,
                    msg.body,
                    msg.priority,
                    tags_json,
                    msg.click,
                    actions_json,
                    attachment_json,
                    msg.received_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DbError> {
        self.with_conn(|conn| {
            let msg = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    [id],
                    row_to_message,
                )
                .optional()?;
            Ok(msg)
        })
    }

    /// Messages of one topic, newest first.
    pub fn get_topic_messages(
        &self,
        topic_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<StoredMessage>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE topic_id = ?1
                 ORDER BY received_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![topic_id.to_string(), limit.unwrap_or(-1)],
                row_to_message,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn mark_message_read(&self, id: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE messages SET is_read = true WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Mark every unread message of a topic as read; returns how many changed.
    pub fn mark_topic_read(&self, topic_id: Uuid) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = true WHERE topic_id = ?1 AND is_read = false",
                [topic_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn unread_count(&self, topic_id: Uuid) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE topic_id = ?1 AND is_read = false",
                [topic_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Unread counts keyed by topic; topics without unread messages are absent.
    pub fn unread_counts(&self) -> Result<HashMap<Uuid, i64>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT topic_id, COUNT(*) FROM messages WHERE is_read = false GROUP BY topic_id",
            )?;
            let rows = stmt.query_map([], |row| Ok((uuid_column(row, 0)?, row.get(1)?)))?;
            Ok(rows.collect::<Result<HashMap<_, _>, _>>()?)
        })
    }

    pub fn total_unread_count(&self) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE is_read = false",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Delete messages received before `before_unix`.
    pub fn cleanup_messages_before(&self, before_unix: i64) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM messages WHERE received_at < ?1", [before_unix])?;
            Ok(deleted)
        })
    }
}
