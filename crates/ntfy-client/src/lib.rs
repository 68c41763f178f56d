//! ntfy subscription client library.
//!
//! Holds one long-lived SSE stream per subscribed topic, decodes the ntfy
//! event protocol, and recovers from failures with bounded exponential
//! backoff. The [`Coordinator`] is the single owner of per-topic connection
//! state; UIs observe it through per-topic watch cells or the ordered
//! state-change broadcast.

pub mod auth;
pub mod backoff;
pub mod coordinator;
pub mod event;
pub mod lifecycle;
pub mod projection;
pub mod stream;
pub mod topic;

#[cfg(test)]
mod test_support;

pub use auth::{CredentialLookup, NoCredentials, basic_auth_header};
pub use backoff::{ReconnectPolicy, RetryDecision};
pub use coordinator::{Coordinator, CoordinatorConfig, StateChange, TopicMessage, TopicStatus};
pub use event::{EventKind, InboundEvent, MessageAction, MessageAttachment};
pub use lifecycle::{PowerEvent, drive_power_events};
pub use projection::StateProjection;
pub use stream::ConnectionState;
pub use topic::{DEFAULT_SERVER_URL, Topic};

/// Unified error type for the ntfy-client crate.
#[derive(Debug, thiserror::Error)]
pub enum NtfyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Stream endpoint returned status {0}")]
    Status(u16),

    #[error("Stream closed by server")]
    StreamClosed,

    #[error("No data received within keepalive timeout")]
    KeepaliveTimeout,

    #[error("Stream line exceeds {0} bytes")]
    LineTooLong(usize),
}
