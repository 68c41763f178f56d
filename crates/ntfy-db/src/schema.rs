//! Database schema definitions and migrations.

use rusqlite::Connection;

use crate::DbError;

pub fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    display_name TEXT,
    server_url TEXT NOT NULL,
    username TEXT,
    is_managed BOOLEAN NOT NULL DEFAULT false,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_topics_name_server ON topics(name, server_url);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    title TEXT,
    body TEXT NOT NULL DEFAULT '',
    priority INTEGER NOT NULL DEFAULT 3,
    tags_json TEXT NOT NULL DEFAULT '[]',
    click TEXT,
    actions_json TEXT,
    attachment_json TEXT,
    is_read BOOLEAN NOT NULL DEFAULT false,
    received_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_topic_received ON messages(topic_id, received_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(topic_id, is_read);

CREATE TABLE IF NOT EXISTS credentials (
    topic_id TEXT PRIMARY KEY REFERENCES topics(id) ON DELETE CASCADE,
    password TEXT NOT NULL,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    setting_type TEXT NOT NULL DEFAULT 'normal',
    is_required BOOLEAN NOT NULL DEFAULT false,
    description TEXT,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;
