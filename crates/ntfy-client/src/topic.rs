//! Topic descriptor and stream endpoint derivation.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::NtfyError;

pub const DEFAULT_SERVER_URL: &str = "https://ntfy.sh";
const STREAM_SUFFIX: &str = "sse";

/// Characters escaped inside a single path segment. Everything outside the
/// RFC 3986 `pchar` set is encoded, as is `/` so a name stays one segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A subscription target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    /// Server-side topic string.
    pub name: String,
    pub display_name: Option<String>,
    pub server_url: String,
    pub username: Option<String>,
}

impl Topic {
    /// New topic on the default server with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            username: None,
        }
    }

    pub fn with_server(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Alias if one is set (even an empty one), otherwise the topic name.
    pub fn effective_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// `{server}/{encoded name}/sse`, derived on every call from the current
    /// name and server URL.
    pub fn stream_url(&self) -> Result<Url, NtfyError> {
        if self.name.trim().is_empty() {
            return Err(NtfyError::InvalidTopic("topic name is empty".into()));
        }
        let base = self.server_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(NtfyError::InvalidTopic("server URL is empty".into()));
        }
        let encoded = utf8_percent_encode(&self.name, PATH_SEGMENT);
        let url = Url::parse(&format!("{base}/{encoded}/{STREAM_SUFFIX}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(NtfyError::InvalidTopic(format!(
                "unsupported URL scheme: {other}"
            ))),
        }
    }
}
