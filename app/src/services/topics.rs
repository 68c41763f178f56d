//! Topic management: add, rename, delete and resubscribe, keeping the store
//! and the coordinator in step.

use ntfy_client::{NtfyError, Topic};
use ntfy_db::{Database, DbError, NewTopic, StoredTopic};
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::SharedState;

const ADJECTIVES: &[&str] = &[
    "swift", "happy", "lazy", "brave", "calm", "clever", "eager", "fancy", "gentle", "jolly",
];
const NOUNS: &[&str] = &[
    "fox", "owl", "bear", "wolf", "hawk", "deer", "lion", "tiger", "eagle", "raven",
];

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("topic not found: {0}")]
    NotFound(Uuid),
    #[error("topic {0} is managed by the administrator and cannot be deleted")]
    Managed(Uuid),
    #[error("invalid topic: {0}")]
    Invalid(#[from] NtfyError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Request body for adding a topic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddTopic {
    pub name: String,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn to_client_topic(stored: &StoredTopic) -> Topic {
    Topic {
        id: stored.id,
        name: stored.name.clone(),
        display_name: stored.display_name.clone(),
        server_url: stored.server_url.clone(),
        username: stored.username.clone(),
    }
}

/// Every stored topic, in the form the coordinator subscribes to.
pub fn all_client_topics(db: &Database) -> Result<Vec<Topic>, DbError> {
    Ok(db.list_topics()?.iter().map(to_client_topic).collect())
}

/// Persist a topic, store its password when one is given, and subscribe.
pub async fn add_topic(state: &SharedState, req: AddTopic) -> Result<StoredTopic, TopicError> {
    let server_url = match non_empty(req.server_url.as_deref()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => state.config().await.default_server_url.clone(),
    };
    let name = req.name.trim();
    let username = non_empty(req.username.as_deref());

    let mut candidate = Topic::new(name).with_server(server_url.as_str());
    if let Some(username) = username {
        candidate = candidate.with_username(username);
    }
    candidate.stream_url()?;

    let stored = state.db().insert_topic(&NewTopic {
        id: candidate.id,
        name,
        display_name: non_empty(req.display_name.as_deref()),
        server_url: &server_url,
        username,
        is_managed: false,
    })?;

    if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        state.db().set_topic_password(stored.id, password)?;
    }

    state.coordinator().subscribe(to_client_topic(&stored))?;
    tracing::info!(topic_id = %stored.id, topic = %stored.name, "Topic added");
    Ok(stored)
}

/// Unsubscribe, forget the password and delete the topic with its messages.
pub fn delete_topic(state: &SharedState, id: Uuid) -> Result<(), TopicError> {
    let topic = state.db().get_topic(id)?.ok_or(TopicError::NotFound(id))?;
    if topic.is_managed {
        return Err(TopicError::Managed(id));
    }

    state.coordinator().unsubscribe(id);
    state.db().delete_topic_password(id)?;
    state.db().delete_topic(id)?;
    tracing::info!(topic_id = %id, topic = %topic.name, "Topic deleted");
    Ok(())
}

/// Set the display alias; a blank alias clears it.
pub fn rename_topic(
    state: &SharedState,
    id: Uuid,
    display_name: Option<&str>,
) -> Result<StoredTopic, TopicError> {
    let alias = non_empty(display_name);
    if !state.db().update_topic_display_name(id, alias)? {
        return Err(TopicError::NotFound(id));
    }
    state.db().get_topic(id)?.ok_or(TopicError::NotFound(id))
}

/// Restart the stream for one topic with a fresh failure counter.
pub fn resubscribe(state: &SharedState, id: Uuid) -> Result<(), TopicError> {
    let topic = state.db().get_topic(id)?.ok_or(TopicError::NotFound(id))?;
    state.coordinator().subscribe(to_client_topic(&topic))?;
    Ok(())
}

/// A random `adjective-noun-NNN` name.
pub fn random_topic_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u16 = rng.gen_range(100..1000);
    format!("{adjective}-{noun}-{number}")
}
