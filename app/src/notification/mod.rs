//! Desktop notifications for received messages.
//!
//! Each stored message becomes a [`NotificationRequest`]; the [`FocusFilter`]
//! decides whether it is presented, and the queue hands it to the shell.

pub mod filter;
pub mod queue;
pub mod types;

pub use filter::FocusFilter;
pub use types::NotificationRequest;

use crate::app::SharedState;

/// Initialize the notification system.
pub async fn initialize(state: &SharedState) {
    queue::start_worker(state.clone()).await;
    if state.config().await.notification_enabled {
        tracing::info!("Notification system initialized");
    } else {
        tracing::info!("Notification system initialized (notifications disabled)");
    }
}
