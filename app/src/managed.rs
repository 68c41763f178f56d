//! Administrator-provided topics.
//!
//! `MANAGED_TOPICS` holds a JSON array of `{name, serverURL?, username?}`.
//! Every listed topic is ensured to exist and flagged as managed; managed
//! topics cannot be deleted through the API.

use ntfy_db::{Database, DbError, NewTopic, StoredTopic};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTopicConfig {
    pub name: String,
    #[serde(rename = "serverURL", default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Parse the `MANAGED_TOPICS` setting. Blank input counts as an empty list.
pub fn parse_managed_topics(raw: &str) -> Result<Vec<ManagedTopicConfig>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

/// Outcome of [`sync_managed_topics`].
#[derive(Debug, Default)]
pub struct ManagedSync {
    /// Topics created by this pass.
    pub created: Vec<StoredTopic>,
    /// Existing topics that became managed.
    pub adopted: usize,
    /// Topics no longer listed that lost the managed flag.
    pub released: usize,
}

/// Make the stored topics match the managed list.
pub fn sync_managed_topics(
    db: &Database,
    configs: &[ManagedTopicConfig],
    default_server_url: &str,
) -> Result<ManagedSync, DbError> {
    let mut result = ManagedSync::default();
    let mut listed = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.name.trim();
        if name.is_empty() {
            continue;
        }
        let server_url = config
            .server_url
            .as_deref()
            .unwrap_or(default_server_url)
            .trim_end_matches('/');

        match db.find_topic(name, server_url)? {
            Some(existing) => {
                if !existing.is_managed {
                    db.set_topic_managed(existing.id, true)?;
                    result.adopted += 1;
                }
                listed.push(existing.id);
            }
            None => {
                let topic = db.insert_topic(&NewTopic {
                    id: Uuid::new_v4(),
                    name,
                    display_name: None,
                    server_url,
                    username: config.username.as_deref().filter(|u| !u.is_empty()),
                    is_managed: true,
                })?;
                tracing::info!(topic = name, server_url, "Managed topic added");
                listed.push(topic.id);
                result.created.push(topic);
            }
        }
    }

    for topic in db.list_topics()? {
        if topic.is_managed && !listed.contains(&topic.id) {
            db.set_topic_managed(topic.id, false)?;
            result.released += 1;
        }
    }

    Ok(result)
}
