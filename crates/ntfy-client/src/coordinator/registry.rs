use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::TopicStatus;
use crate::Topic;
use crate::stream::ConnectionState;

/// A spawned task together with the token that stops it.
pub(super) struct TaskSlot {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskSlot {
    pub(super) fn new(cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { cancel, handle }
    }

    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Registry record for one topic id.
///
/// At most one of `session` and `retry` is set at a time. `generation`
/// belongs to whichever of the two is current.
pub(super) struct Entry {
    pub(super) topic: Topic,
    pub(super) generation: u64,
    pub(super) session: Option<TaskSlot>,
    pub(super) retry: Option<TaskSlot>,
    pub(super) failures: u32,
    pub(super) state: ConnectionState,
}

impl Entry {
    pub(super) fn new(topic: Topic) -> Self {
        Self {
            topic,
            generation: 0,
            session: None,
            retry: None,
            failures: 0,
            state: ConnectionState::Disconnected,
        }
    }

    pub(super) fn stop_tasks(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        if let Some(retry) = self.retry.take() {
            retry.stop();
        }
    }

    pub(super) fn owns_session(&self, generation: u64) -> bool {
        self.generation == generation && self.session.is_some()
    }

    pub(super) fn owns_retry(&self, generation: u64) -> bool {
        self.generation == generation && self.retry.is_some()
    }

    pub(super) fn status(&self) -> TopicStatus {
        TopicStatus {
            state: self.state,
            failures: self.failures,
            session_active: self.session.is_some(),
            retry_pending: self.retry.is_some(),
        }
    }
}
