//! Password lookup for authenticated topics, backed by the `credentials` table.

use ntfy_client::CredentialLookup;
use ntfy_db::Database;
use uuid::Uuid;

pub struct DbCredentials {
    db: Database,
}

impl DbCredentials {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CredentialLookup for DbCredentials {
    fn password(&self, topic_id: Uuid) -> Option<String> {
        match self.db.get_topic_password(topic_id) {
            Ok(password) => password.filter(|p| !p.is_empty()),
            Err(e) => {
                tracing::warn!(%topic_id, "Failed to read topic password: {e}");
                None
            }
        }
    }
}
