//! Per-topic password storage, keyed by topic id.

use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::{Database, DbError};

impl Database {
    pub fn set_topic_password(&self, topic_id: Uuid, password: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials (topic_id, password, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(topic_id) DO UPDATE SET password = ?2, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![topic_id.to_string(), password],
            )?;
            Ok(())
        })
    }

    pub fn get_topic_password(&self, topic_id: Uuid) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| {
            let password = conn
                .query_row(
                    "SELECT password FROM credentials WHERE topic_id = ?1",
                    [topic_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(password)
        })
    }

    pub fn delete_topic_password(&self, topic_id: Uuid) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM credentials WHERE topic_id = ?1",
                [topic_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }
}
