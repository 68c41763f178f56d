use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::Topic;

/// One outbound stream request for one topic.
pub struct StreamSession {
    http: reqwest::Client,
    topic: Topic,
    authorization: Option<String>,
    keepalive_timeout: Duration,
    cancel: CancellationToken,
}

impl StreamSession {
    pub fn new(
        http: reqwest::Client,
        topic: Topic,
        authorization: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            topic,
            authorization,
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            cancel,
        }
    }

    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }

    /// Run until the stream ends or the session is cancelled.
    ///
    /// Cancellation drops the in-flight request and response body, which
    /// closes the underlying connection.
    pub async fn run<S: SessionSink>(self, sink: &S) -> SessionEnd {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => SessionEnd::Cancelled,
            result = self.read_stream(sink) => match result {
                Ok(()) => SessionEnd::Failed(NtfyError::StreamClosed),
                Err(e) => SessionEnd::Failed(e),
            },
        }
    }

    async fn read_stream<S: SessionSink>(&self, sink: &S) -> Result<(), NtfyError> {
        let url = self.topic.stream_url()?;
        tracing::debug!(topic = %self.topic.name, url = %url, "Opening stream");

        let mut request = self.http.get(url).header(ACCEPT, "text/event-stream");
        if let Some(auth) = &self.authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        let response = request.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(topic = %self.topic.name, status = status.as_u16(), "Stream request rejected");
            return Err(NtfyError::Status(status.as_u16()));
        }

        sink.connected();

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();
        loop {
            match tokio::time::timeout(self.keepalive_timeout, body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    for line in lines.feed(&chunk)? {
                        self.handle_line(&line, sink).await;
                    }
                }
                Ok(Some(Err(e))) => return Err(NtfyError::Http(e)),
                Ok(None) => {
                    if let Some(line) = lines.finish() {
                        self.handle_line(&line, sink).await;
                    }
                    tracing::info!(topic = %self.topic.name, "Stream closed by server");
                    return Ok(());
                }
                Err(_) => {
                    tracing::warn!(topic = %self.topic.name, "Stream keepalive timeout");
                    return Err(NtfyError::KeepaliveTimeout);
                }
            }
        }
    }

    async fn handle_line<S: SessionSink>(&self, line: &str, sink: &S) {
        let Line::Data(payload) = Line::classify(line) else {
            return;
        };
        match InboundEvent::from_json(payload) {
            Ok(event) if event.is_message() => {
                tracing::debug!(topic = %self.topic.name, message_id = %event.id, "Message received");
                sink.message(event).await;
            }
            Ok(event) => {
                tracing::trace!(topic = %self.topic.name, kind = ?event.event, "Control event received");
            }
            Err(e) => {
                tracing::debug!(topic = %self.topic.name, error = %e, "Skipping malformed data line");
            }
        }
    }
}
