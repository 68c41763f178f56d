//! Consumes decoded messages from the coordinator: store, push to the shell,
//! and hand a notification to the queue.

use ntfy_client::TopicMessage;
use ntfy_db::{NewMessage, StoredMessage};
use serde_json::json;
use tokio::sync::mpsc;

use crate::app::SharedState;
use crate::notification::{self, FocusFilter, NotificationRequest};

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum Handled {
    /// Topic was deleted while the message was in flight.
    UnknownTopic,
    /// Same message id already stored.
    Duplicate,
    Stored {
        message: StoredMessage,
        notification: Option<NotificationRequest>,
    },
}

pub async fn run(state: SharedState, mut messages: mpsc::Receiver<TopicMessage>) {
    let shutdown = state.shutdown_token().clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = messages.recv() => {
                let Some(msg) = msg else { break };
                let topic_id = msg.topic_id;
                match handle_message(&state, msg).await {
                    Ok(Handled::Stored { notification: Some(request), .. }) => {
                        if let Err(e) = notification::queue::enqueue(request).await {
                            tracing::warn!(%topic_id, "Notification dropped: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(%topic_id, "Failed to handle message: {e}"),
                }
            }
        }
    }
    tracing::info!("Message handler stopped");
}

/// Persist one message and build its notification when the focus filter
/// lets it through.
pub async fn handle_message(
    state: &SharedState,
    msg: TopicMessage,
) -> Result<Handled, anyhow::Error> {
    let TopicMessage { topic_id, event } = msg;
    let Some(topic) = state.db().get_topic(topic_id)? else {
        tracing::debug!(%topic_id, message_id = %event.id, "Message for unknown topic dropped");
        return Ok(Handled::UnknownTopic);
    };

    let tags = event.tags.clone().unwrap_or_default();
    let actions = event
        .actions
        .as_ref()
        .filter(|a| !a.is_empty())
        .map(serde_json::to_value)
        .transpose()?;
    let attachment = event.attachment.as_ref().map(serde_json::to_value).transpose()?;

    let inserted = state.db().insert_message(&NewMessage {
        id: &event.id,
        topic_id,
        title: event.title.as_deref(),
        body: event.body(),
        priority: event.priority_or_default(),
        tags: &tags,
        click: event.click.as_deref(),
        actions,
        attachment,
        received_at: event.time,
    })?;
    if !inserted {
        tracing::debug!(%topic_id, message_id = %event.id, "Duplicate message ignored");
        return Ok(Handled::Duplicate);
    }

    let message = state
        .db()
        .get_message(&event.id)?
        .ok_or_else(|| anyhow::anyhow!("stored message {} vanished", event.id))?;
    let display_name = topic.display_name.as_deref().unwrap_or(&topic.name);
    let request = NotificationRequest::from_message(&message, display_name);

    tracing::info!(
        %topic_id,
        message_id = %message.id,
        priority = message.priority,
        "Message received"
    );
    state.broadcast_ws(
        "message",
        json!({
            "message": &message,
            "display_title": &request.title,
            "unread": state.db().unread_count(topic_id)?,
        }),
    );

    let filter = FocusFilter::from_config(&*state.config().await);
    let notification = if filter.allows(&request) {
        Some(request)
    } else {
        tracing::debug!(criteria = %request.filter_criteria(), "Notification filtered out");
        None
    };
    Ok(Handled::Stored {
        message,
        notification,
    })
}
