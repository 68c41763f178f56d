//! Credential lookup for authenticated topics.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::Topic;

/// Read-only access to stored per-topic passwords.
///
/// Implemented by the application over its secret store; the coordinator
/// only ever reads through it.
pub trait CredentialLookup: Send + Sync {
    fn password(&self, topic_id: Uuid) -> Option<String>;
}

/// Lookup that never returns a credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialLookup for NoCredentials {
    fn password(&self, _topic_id: Uuid) -> Option<String> {
        None
    }
}

impl<F> CredentialLookup for F
where
    F: Fn(Uuid) -> Option<String> + Send + Sync,
{
    fn password(&self, topic_id: Uuid) -> Option<String> {
        self(topic_id)
    }
}

/// `Basic base64(username:password)`.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Header for a topic, present only when it has a username and a stored
/// password.
pub(crate) fn authorization_for(
    topic: &Topic,
    credentials: &dyn CredentialLookup,
) -> Option<String> {
    let username = topic.username.as_deref()?;
    let password = credentials.password(topic.id)?;
    Some(basic_auth_header(username, &password))
}
