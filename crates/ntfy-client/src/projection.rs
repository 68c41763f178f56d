//! Per-topic observable connection state.
//!
//! Every topic id gets its own `watch` channel, so a change to one topic
//! only wakes that topic's observers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use crate::stream::ConnectionState;

#[derive(Debug, Default)]
pub struct StateProjection {
    cells: Mutex<HashMap<Uuid, watch::Sender<ConnectionState>>>,
}

impl StateProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer for one topic, creating the cell (as `disconnected`) on
    /// first access.
    pub fn watch(&self, topic_id: Uuid) -> watch::Receiver<ConnectionState> {
        self.cells()
            .entry(topic_id)
            .or_insert_with(|| watch::channel(ConnectionState::Disconnected).0)
            .subscribe()
    }

    /// Current value of a topic's cell, `disconnected` if there is none.
    pub fn current(&self, topic_id: Uuid) -> ConnectionState {
        self.cells()
            .get(&topic_id)
            .map(|tx| *tx.borrow())
            .unwrap_or_default()
    }

    pub(crate) fn publish(&self, topic_id: Uuid, state: ConnectionState) {
        let mut cells = self.cells();
        match cells.get(&topic_id) {
            Some(tx) => {
                tx.send_if_modified(|current| {
                    if *current == state {
                        return false;
                    }
                    *current = state;
                    true
                });
            }
            None => {
                cells.insert(topic_id, watch::channel(state).0);
            }
        }
    }

    /// Drop a topic's cell. Existing observers keep the last value and see
    /// the channel close.
    pub(crate) fn remove(&self, topic_id: Uuid) {
        self.cells().remove(&topic_id);
    }

    pub fn len(&self) -> usize {
        self.cells().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Cells hold plain watch senders, so a panic elsewhere cannot leave
    // the map half-updated.
    fn cells(&self) -> MutexGuard<'_, HashMap<Uuid, watch::Sender<ConnectionState>>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
