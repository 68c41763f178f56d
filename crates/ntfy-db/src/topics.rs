//! Subscribed topic storage.

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Database, DbError, uuid_column};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTopic {
    pub id: Uuid,
    pub name: String,
    pub display_name: Option<String>,
    pub server_url: String,
    pub username: Option<String>,
    pub is_managed: bool,
    pub created_at: i64,
}

/// Fields supplied when a topic is created.
#[derive(Debug, Clone)]
pub struct NewTopic<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub display_name: Option<&'a str>,
    pub server_url: &'a str,
    pub username: Option<&'a str>,
    pub is_managed: bool,
}

const TOPIC_COLUMNS: &str =
    "id, name, display_name, server_url, username, is_managed, created_at";

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredTopic> {
    Ok(StoredTopic {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        server_url: row.get(3)?,
        username: row.get(4)?,
        is_managed: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    pub fn insert_topic(&self, topic: &NewTopic<'_>) -> Result<StoredTopic, DbError> {
        let created_at = chrono::Utc::now().timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO topics (id, name, display_name, server_url, username, is_managed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    topic.id.to_string(),
                    topic.name,
                    topic.display_name,
                    topic.server_url,
                    topic.username,
                    topic.is_managed,
                    created_at,
                ],
            )?;
            Ok(())
        })?;
        tracing::debug!(topic_id = %topic.id, topic = topic.name, "Topic stored");
        self.get_topic(topic.id)?
            .ok_or_else(|| DbError::NotFound(format!("topic {}", topic.id)))
    }

    pub fn get_topic(&self, id: Uuid) -> Result<Option<StoredTopic>, DbError> {
        self.with_conn(|conn| {
            let topic = conn
                .query_row(
                    &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
                    [id.to_string()],
                    row_to_topic,
                )
                .optional()?;
            Ok(topic)
        })
    }

    /// All topics in creation order.
    pub fn list_topics(&self) -> Result<Vec<StoredTopic>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOPIC_COLUMNS} FROM topics ORDER BY created_at ASC, name ASC"
            ))?;
            let rows = stmt.query_map([], row_to_topic)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Topic with the given server-side name on the given server.
    pub fn find_topic(&self, name: &str, server_url: &str) -> Result<Option<StoredTopic>, DbError> {
        self.with_conn(|conn| {
            let topic = conn
                .query_row(
                    &format!(
                        "SELECT {TOPIC_COLUMNS} FROM topics WHERE name = ?1 AND server_url = ?2
                         ORDER BY created_at ASC LIMIT 1"
                    ),
                    [name, server_url],
                    row_to_topic,
                )
                .optional()?;
            Ok(topic)
        })
    }

    /// Set or clear the display alias. Returns false when the topic does not
    /// exist.
    pub fn update_topic_display_name(
        &self,
        id: Uuid,
        display_name: Option<&str>,
    ) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE topics SET display_name = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), display_name],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_topic_managed(&self, id: Uuid, is_managed: bool) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE topics SET is_managed = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), is_managed],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a topic together with its messages and stored password.
    pub fn delete_topic(&self, id: Uuid) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM topics WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }
}
