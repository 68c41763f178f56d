//! Subscription registry and connection coordinator.
//!
//! The coordinator owns, per topic id, the active stream task, the pending
//! retry timer, the consecutive-failure counter and the last known
//! [`ConnectionState`]. All of it lives behind one mutex and is only touched
//! in short synchronous sections, never across an await. Tasks identify
//! themselves with a generation number; a task whose generation no longer
//! matches its entry has been superseded and its reports are ignored.

mod registry;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::{CredentialLookup, authorization_for};
use crate::backoff::{ReconnectPolicy, RetryDecision};
use crate::event::InboundEvent;
use crate::projection::StateProjection;
use crate::stream::{
    ConnectionState, DEFAULT_KEEPALIVE_TIMEOUT, SessionEnd, SessionSink, StreamSession,
};
use crate::{NtfyError, Topic};

use registry::{Entry, TaskSlot};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const STATE_CHANNEL_CAPACITY: usize = 256;
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// A decoded message together with the topic it arrived on.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub topic_id: Uuid,
    pub event: InboundEvent,
}

/// One per-topic state transition, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub topic_id: Uuid,
    pub state: ConnectionState,
}

/// Registry view of one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopicStatus {
    pub state: ConnectionState,
    pub failures: u32,
    pub session_active: bool,
    pub retry_pending: bool,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub policy: ReconnectPolicy,
    pub keepalive_timeout: Duration,
    pub message_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            message_buffer: MESSAGE_CHANNEL_CAPACITY,
        }
    }
}

/// Single source of truth for per-topic connection state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: CoordinatorConfig,
    credentials: Arc<dyn CredentialLookup>,
    registry: Mutex<HashMap<Uuid, Entry>>,
    projection: StateProjection,
    changes: broadcast::Sender<StateChange>,
    messages: mpsc::Sender<TopicMessage>,
    next_generation: AtomicU64,
}

impl Coordinator {
    /// Build a coordinator. Decoded messages are delivered on the returned
    /// receiver.
    pub fn new(
        config: CoordinatorConfig,
        credentials: Arc<dyn CredentialLookup>,
    ) -> Result<(Self, mpsc::Receiver<TopicMessage>), NtfyError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ntfy-menubar/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (message_tx, message_rx) = mpsc::channel(config.message_buffer.max(1));
        let (changes, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let coordinator = Self {
            inner: Arc::new(Inner {
                http,
                config,
                credentials,
                registry: Mutex::new(HashMap::new()),
                projection: StateProjection::new(),
                changes,
                messages: message_tx,
                next_generation: AtomicU64::new(1),
            }),
        };
        Ok((coordinator, message_rx))
    }

    /// Start (or restart) the stream for a topic.
    ///
    /// Any existing session or pending retry for the same id is cancelled
    /// first and the failure counter is reset. Fails only when the topic's
    /// stream endpoint cannot be derived, in which case nothing changes.
    pub fn subscribe(&self, topic: Topic) -> Result<(), NtfyError> {
        topic.stream_url()?;
        let auth = authorization_for(&topic, self.inner.credentials.as_ref());
        let topic_id = topic.id;

        let mut registry = self.inner.registry();
        let entry = registry
            .entry(topic_id)
            .or_insert_with(|| Entry::new(topic.clone()));
        entry.stop_tasks();
        entry.topic = topic;
        entry.failures = 0;
        tracing::info!(%topic_id, topic = %entry.topic.name, "Subscribing to topic");
        self.inner.start_session(topic_id, entry, auth);
        Ok(())
    }

    /// Cancel the topic's session and retry timer and forget all of its
    /// registry state.
    pub fn unsubscribe(&self, topic_id: Uuid) {
        let mut registry = self.inner.registry();
        if let Some(mut entry) = registry.remove(&topic_id) {
            entry.stop_tasks();
            self.inner
                .set_state(topic_id, &mut entry, ConnectionState::Disconnected);
            tracing::info!(%topic_id, topic = %entry.topic.name, "Unsubscribed from topic");
        }
        self.inner.projection.remove(topic_id);
    }

    /// Cancel every session and timer and clear the registry.
    pub fn disconnect_all(&self) {
        let mut registry = self.inner.registry();
        let count = registry.len();
        for (topic_id, mut entry) in registry.drain() {
            entry.stop_tasks();
            self.inner
                .set_state(topic_id, &mut entry, ConnectionState::Disconnected);
        }
        tracing::info!(count, "Disconnected all topics");
    }

    /// Reset the failure counter of every listed topic, then subscribe each
    /// one. Returns how many subscriptions were started.
    pub fn reconnect_all(&self, topics: &[Topic]) -> usize {
        {
            let mut registry = self.inner.registry();
            for topic in topics {
                if let Some(entry) = registry.get_mut(&topic.id) {
                    entry.failures = 0;
                }
            }
        }

        let mut started = 0;
        for topic in topics {
            match self.subscribe(topic.clone()) {
                Ok(()) => started += 1,
                Err(e) => {
                    tracing::warn!(topic_id = %topic.id, topic = %topic.name, error = %e, "Skipping topic on reconnect");
                }
            }
        }
        tracing::info!(started, total = topics.len(), "Reconnected topics");
        started
    }

    /// Last known state, `disconnected` when the topic has no entry.
    pub fn connection_state(&self, topic_id: Uuid) -> ConnectionState {
        self.inner
            .registry()
            .get(&topic_id)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    pub fn status(&self, topic_id: Uuid) -> Option<TopicStatus> {
        self.inner.registry().get(&topic_id).map(Entry::status)
    }

    pub fn topic_ids(&self) -> Vec<Uuid> {
        self.inner.registry().keys().copied().collect()
    }

    /// Observable cell for one topic.
    pub fn watch(&self, topic_id: Uuid) -> watch::Receiver<ConnectionState> {
        self.inner.projection.watch(topic_id)
    }

    /// Every state transition across all topics.
    pub fn state_changes(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn set_state(&self, topic_id: Uuid, entry: &mut Entry, state: ConnectionState) {
        entry.state = state;
        self.projection.publish(topic_id, state);
        let _ = self.changes.send(StateChange { topic_id, state });
        tracing::debug!(%topic_id, %state, "Connection state changed");
    }

    fn start_session(self: &Arc<Self>, topic_id: Uuid, entry: &mut Entry, auth: Option<String>) {
        let generation = self.generation();
        entry.generation = generation;
        self.set_state(topic_id, entry, ConnectionState::Connecting);

        let cancel = CancellationToken::new();
        let session = StreamSession::new(
            self.http.clone(),
            entry.topic.clone(),
            auth,
            cancel.clone(),
        )
        .with_keepalive_timeout(self.config.keepalive_timeout);
        let link = SessionLink {
            inner: Arc::clone(self),
            topic_id,
            generation,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(async move {
            let end = session.run(&link).await;
            link.inner.session_ended(link.topic_id, link.generation, end);
        });
        entry.session = Some(TaskSlot::new(cancel, handle));
    }

    fn session_connected(&self, topic_id: Uuid, generation: u64) {
        let mut registry = self.registry();
        let Some(entry) = registry.get_mut(&topic_id) else {
            return;
        };
        if !entry.owns_session(generation) {
            return;
        }
        entry.failures = 0;
        self.set_state(topic_id, entry, ConnectionState::Connected);
        tracing::info!(%topic_id, topic = %entry.topic.name, "Stream connected");
    }

    fn session_ended(self: &Arc<Self>, topic_id: Uuid, generation: u64, end: SessionEnd) {
        let mut registry = self.registry();
        let Some(entry) = registry.get_mut(&topic_id) else {
            return;
        };
        if !entry.owns_session(generation) {
            return;
        }
        entry.session = None;
        self.set_state(topic_id, entry, ConnectionState::Disconnected);

        match end {
            SessionEnd::Cancelled => {
                tracing::info!(%topic_id, "Stream cancelled");
            }
            SessionEnd::Failed(e) => {
                tracing::warn!(%topic_id, topic = %entry.topic.name, error = %e, "Stream ended");
                self.schedule_retry(topic_id, entry);
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, topic_id: Uuid, entry: &mut Entry) {
        match self.config.policy.next_step(entry.failures) {
            RetryDecision::GiveUp => {
                entry.failures = entry.failures.saturating_add(1);
                self.set_state(topic_id, entry, ConnectionState::Failed);
                tracing::error!(
                    %topic_id,
                    topic = %entry.topic.name,
                    failures = entry.failures,
                    "Max reconnect attempts reached, giving up"
                );
            }
            RetryDecision::Retry { attempt, delay } => {
                entry.failures = attempt;
                let generation = self.generation();
                entry.generation = generation;
                self.set_state(topic_id, entry, ConnectionState::Reconnecting { attempt });
                tracing::warn!(
                    %topic_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );

                let cancel = CancellationToken::new();
                let timer_cancel = cancel.clone();
                let inner = Arc::clone(self);
                let handle = tokio::spawn(async move {
                    tokio::select! {
                        _ = timer_cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => inner.retry_due(topic_id, generation),
                    }
                });
                entry.retry = Some(TaskSlot::new(cancel, handle));
            }
        }
    }

    fn retry_due(self: &Arc<Self>, topic_id: Uuid, generation: u64) {
        let topic = {
            let registry = self.registry();
            match registry.get(&topic_id) {
                Some(entry) if entry.owns_retry(generation) => entry.topic.clone(),
                _ => return,
            }
        };
        let auth = authorization_for(&topic, self.credentials.as_ref());

        let mut registry = self.registry();
        let Some(entry) = registry.get_mut(&topic_id) else {
            return;
        };
        if !entry.owns_retry(generation) {
            return;
        }
        entry.retry = None;
        self.start_session(topic_id, entry, auth);
    }
}

/// Sink handed to a running session; reports are tagged with the session's
/// generation so superseded sessions cannot touch the registry.
struct SessionLink {
    inner: Arc<Inner>,
    topic_id: Uuid,
    generation: u64,
    cancel: CancellationToken,
}

impl SessionSink for SessionLink {
    fn connected(&self) {
        self.inner.session_connected(self.topic_id, self.generation);
    }

    async fn message(&self, event: InboundEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let message = TopicMessage {
            topic_id: self.topic_id,
            event,
        };
        if self.inner.messages.send(message).await.is_err() {
            tracing::trace!(topic_id = %self.topic_id, "Message receiver dropped");
        }
    }
}
