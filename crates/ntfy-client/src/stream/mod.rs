//! Per-topic SSE stream session.
//!
//! A session issues one `GET {server}/{topic}/sse`, reports when the server
//! answers 200, forwards decoded `message` events to its sink and runs until
//! the body ends, the transport fails, the keepalive watchdog fires, or the
//! owner cancels it. It never schedules retries itself; the outcome is
//! returned to the owner.

mod connection;
mod lines;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::InboundEvent;
use crate::NtfyError;

pub use connection::StreamSession;
pub use lines::{Line, LineBuffer, MAX_LINE_BYTES};

/// ntfy sends keepalives every 45s; two missed ones end the session.
pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifecycle status of one topic's live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting({attempt})"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Owner-initiated; no retry.
    Cancelled,
    /// Transport error, non-200 status, EOF or keepalive timeout; retryable.
    Failed(NtfyError),
}

/// Receives what a running session observes.
pub trait SessionSink: Send + Sync {
    /// The server answered 200 and the body is being read.
    fn connected(&self);

    /// A decoded `message` event.
    fn message(&self, event: InboundEvent) -> impl Future<Output = ()> + Send;
}
