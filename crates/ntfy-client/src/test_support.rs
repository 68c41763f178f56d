//! Local SSE server and helpers shared by the stream and coordinator tests.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::backoff::ReconnectPolicy;
use crate::coordinator::{CoordinatorConfig, StateChange, TopicMessage};
use crate::{ConnectionState, Topic};

const WAIT: Duration = Duration::from_secs(5);

/// What the server does for one incoming stream request.
#[derive(Debug, Clone)]
pub(crate) enum Behaviour {
    Status(u16),
    Stream { lines: Vec<String>, hold_open: bool },
}

impl Behaviour {
    pub(crate) fn status(code: u16) -> Self {
        Self::Status(code)
    }

    /// Send `lines` and keep the body open.
    pub(crate) fn hold_open<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream {
            lines: lines.into_iter().map(Into::into).collect(),
            hold_open: true,
        }
    }

    /// Send `lines` and end the body.
    pub(crate) fn close_after<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream {
            lines: lines.into_iter().map(Into::into).collect(),
            hold_open: false,
        }
    }
}

#[derive(Default)]
struct ServerState {
    default_script: Mutex<VecDeque<Behaviour>>,
    topic_scripts: Mutex<HashMap<String, VecDeque<Behaviour>>>,
    connections: AtomicUsize,
    open_bodies: AtomicUsize,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl ServerState {
    fn next_behaviour(&self, topic: &str) -> Behaviour {
        let mut scripts = self.topic_scripts.lock().unwrap();
        if let Some(script) = scripts.get_mut(topic) {
            return pop_or_repeat(script);
        }
        drop(scripts);
        pop_or_repeat(&mut self.default_script.lock().unwrap())
    }
}

/// Counts a streaming body as open until hyper drops it, which happens once
/// the client side of the connection is gone.
struct OpenBody(Arc<ServerState>);

impl OpenBody {
    fn new(state: Arc<ServerState>) -> Self {
        state.open_bodies.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for OpenBody {
    fn drop(&mut self) {
        self.0.open_bodies.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pop_or_repeat(script: &mut VecDeque<Behaviour>) -> Behaviour {
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap_or(Behaviour::Status(404))
    }
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestServer {
    /// Serve `/{topic}/sse` on an ephemeral port. Each request consumes the
    /// next behaviour of the script; the last one repeats.
    pub(crate) async fn start(script: Vec<Behaviour>) -> Self {
        let state = Arc::new(ServerState::default());
        *state.default_script.lock().unwrap() = script.into();

        let app = Router::new()
            .route("/{topic}/sse", get(sse_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn topic(&self, name: &str) -> Topic {
        Topic::new(name).with_server(self.url())
    }

    pub(crate) fn set_script(&self, script: Vec<Behaviour>) {
        *self.state.default_script.lock().unwrap() = script.into();
    }

    pub(crate) fn set_topic_script(&self, topic: &str, script: Vec<Behaviour>) {
        self.state
            .topic_scripts
            .lock()
            .unwrap()
            .insert(topic.to_string(), script.into());
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Streaming bodies the server is still serving.
    pub(crate) fn open_connections(&self) -> usize {
        self.state.open_bodies.load(Ordering::SeqCst)
    }

    /// Wait until exactly `expected` streaming bodies are open.
    pub(crate) async fn wait_open_connections(&self, expected: usize) {
        let waited = tokio::time::timeout(WAIT, async {
            while self.open_connections() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "expected {expected} open connections, found {}",
            self.open_connections()
        );
    }

    /// `(topic, Authorization header)` of every request so far.
    pub(crate) fn requests(&self) -> Vec<(String, Option<String>)> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn sse_handler(
    State(state): State<Arc<ServerState>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
) -> Response {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push((topic.clone(), auth));
    state.connections.fetch_add(1, Ordering::SeqCst);

    match state.next_behaviour(&topic) {
        Behaviour::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        Behaviour::Stream { lines, hold_open } => {
            let guard = OpenBody::new(state.clone());
            let items = tokio_stream::iter(
                lines
                    .into_iter()
                    .map(|line| Ok::<_, Infallible>(format!("{line}\n"))),
            );
            let tail: Pin<Box<dyn Stream<Item = Result<String, Infallible>> + Send>> =
                if hold_open {
                    Box::pin(tokio_stream::pending())
                } else {
                    Box::pin(tokio_stream::empty())
                };
            let body = Body::from_stream(items.chain(tail).map(move |item| {
                let _open = &guard;
                item
            }));
            Response::builder()
                .header(CONTENT_TYPE, "text/event-stream")
                .body(body)
                .unwrap()
        }
    }
}

/// Short delays so backoff sequences finish in well under a second.
pub(crate) fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        policy: fast_policy(),
        keepalive_timeout: Duration::from_secs(5),
        ..CoordinatorConfig::default()
    }
}

pub(crate) fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base: Duration::from_millis(10),
        cap: Duration::from_millis(40),
        max_attempts: 10,
    }
}

/// Next state published for `topic_id`, skipping other topics.
pub(crate) async fn next_state(
    changes: &mut broadcast::Receiver<StateChange>,
    topic_id: Uuid,
) -> ConnectionState {
    tokio::time::timeout(WAIT, async {
        loop {
            let change = changes.recv().await.unwrap();
            if change.topic_id == topic_id {
                return change.state;
            }
        }
    })
    .await
    .expect("timed out waiting for a state change")
}

/// Collect states for `topic_id` until `last` is seen (inclusive).
pub(crate) async fn states_until(
    changes: &mut broadcast::Receiver<StateChange>,
    topic_id: Uuid,
    last: ConnectionState,
) -> Vec<ConnectionState> {
    let mut seen = Vec::new();
    loop {
        let state = next_state(changes, topic_id).await;
        seen.push(state);
        if state == last {
            return seen;
        }
    }
}

pub(crate) async fn next_message(messages: &mut mpsc::Receiver<TopicMessage>) -> TopicMessage {
    tokio::time::timeout(WAIT, messages.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("message channel closed")
}
