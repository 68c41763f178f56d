//! Host sleep/wake handling.
//!
//! Before the machine sleeps every stream is torn down; after it wakes the
//! current topic list is reconnected with fresh failure counters.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Coordinator, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerEvent {
    WillSleep,
    DidWake,
}

impl fmt::Display for PowerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WillSleep => f.write_str("will_sleep"),
            Self::DidWake => f.write_str("did_wake"),
        }
    }
}

impl Coordinator {
    /// Apply one power notification. `topics` is the list to restore on wake.
    pub fn handle_power_event(&self, event: PowerEvent, topics: &[Topic]) {
        match event {
            PowerEvent::WillSleep => {
                tracing::info!("System going to sleep, disconnecting all topics");
                self.disconnect_all();
            }
            PowerEvent::DidWake => {
                if topics.is_empty() {
                    tracing::debug!("System woke with no topics to restore");
                    return;
                }
                tracing::info!(count = topics.len(), "System woke, reconnecting all topics");
                self.reconnect_all(topics);
            }
        }
    }
}

/// Forward power notifications to the coordinator until the channel closes
/// or `shutdown` fires. `topics` is asked for the current list on each wake.
pub async fn drive_power_events<F>(
    coordinator: Coordinator,
    mut events: mpsc::Receiver<PowerEvent>,
    topics: F,
    shutdown: CancellationToken,
) where
    F: Fn() -> Vec<Topic> + Send,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let current = match event {
                    PowerEvent::WillSleep => Vec::new(),
                    PowerEvent::DidWake => topics(),
                };
                coordinator.handle_power_event(event, &current);
            }
        }
    }
    tracing::debug!("Power event loop stopped");
}
