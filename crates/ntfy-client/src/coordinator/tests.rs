use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::auth::NoCredentials;
use crate::test_support::{
    Behaviour, TestServer, fast_config, next_message, next_state, states_until,
};

fn coordinator() -> (Coordinator, mpsc::Receiver<TopicMessage>) {
    Coordinator::new(fast_config(), Arc::new(NoCredentials)).unwrap()
}

fn message_line(id: &str) -> String {
    format!(r#"data: {{"id":"{id}","time":1700000000,"event":"message","topic":"alerts","message":"hi"}}"#)
}

use ConnectionState::{Connected, Connecting, Disconnected, Failed, Reconnecting};

#[tokio::test]
async fn connects_and_forwards_message_once() {
    let server = TestServer::start(vec![Behaviour::hold_open([
        r#"data: {"id":"o1","time":1700000000,"event":"open","topic":"alerts"}"#.to_string(),
        r#"data: {"id":"k1","time":1700000001,"event":"keepalive","topic":"alerts"}"#.to_string(),
        "data: not json at all".to_string(),
        message_line("m1"),
    ])])
    .await;
    let topic = server.topic("alerts");
    let (coordinator, mut messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    assert_eq!(next_state(&mut changes, topic.id).await, Connecting);
    assert_eq!(next_state(&mut changes, topic.id).await, Connected);

    let received = next_message(&mut messages).await;
    assert_eq!(received.topic_id, topic.id);
    assert_eq!(received.event.id, "m1");
    assert_eq!(received.event.priority_or_default(), 3);

    // Control events and the malformed line neither produce messages nor
    // disturb the connection.
    assert!(
        tokio::time::timeout(Duration::from_millis(150), messages.recv())
            .await
            .is_err()
    );
    assert_eq!(coordinator.connection_state(topic.id), Connected);
    assert_eq!(*coordinator.watch(topic.id).borrow(), Connected);
    coordinator.disconnect_all();
}

#[tokio::test]
async fn server_errors_follow_backoff_sequence() {
    let server = TestServer::start(vec![Behaviour::status(500)]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    let seen = states_until(&mut changes, topic.id, Reconnecting { attempt: 2 }).await;
    assert_eq!(
        seen,
        vec![
            Connecting,
            Disconnected,
            Reconnecting { attempt: 1 },
            Connecting,
            Disconnected,
            Reconnecting { attempt: 2 },
        ]
    );
    coordinator.disconnect_all();
}

#[tokio::test]
async fn tenth_consecutive_failure_gives_up() {
    let server = TestServer::start(vec![Behaviour::status(503)]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    let seen = states_until(&mut changes, topic.id, Failed).await;
    let attempts: Vec<u32> = seen
        .iter()
        .filter_map(|s| match s {
            Reconnecting { attempt } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, (1..=9).collect::<Vec<_>>());
    assert_eq!(seen.iter().filter(|s| **s == Connecting).count(), 10);

    // No further attempts once failed.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 10);
    let status = coordinator.status(topic.id).unwrap();
    assert_eq!(status.state, Failed);
    assert!(!status.session_active);
    assert!(!status.retry_pending);
}

#[tokio::test]
async fn successful_connect_resets_failures() {
    let server = TestServer::start(vec![
        Behaviour::status(500),
        Behaviour::status(500),
        Behaviour::hold_open(Vec::<String>::new()),
    ])
    .await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    let seen = states_until(&mut changes, topic.id, Connected).await;
    assert!(seen.contains(&Reconnecting { attempt: 2 }));
    let status = coordinator.status(topic.id).unwrap();
    assert_eq!(status.failures, 0);
    assert!(status.session_active);
    coordinator.disconnect_all();
}

#[tokio::test]
async fn stream_closed_by_server_schedules_retry() {
    let server = TestServer::start(vec![
        Behaviour::close_after([message_line("m1")]),
        Behaviour::hold_open(Vec::<String>::new()),
    ])
    .await;
    let topic = server.topic("alerts");
    let (coordinator, mut messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    let seen = states_until(&mut changes, topic.id, Reconnecting { attempt: 1 }).await;
    assert_eq!(
        seen,
        vec![Connecting, Connected, Disconnected, Reconnecting { attempt: 1 }]
    );
    assert_eq!(next_message(&mut messages).await.event.id, "m1");
    assert_eq!(next_state(&mut changes, topic.id).await, Connecting);
    assert_eq!(next_state(&mut changes, topic.id).await, Connected);
    coordinator.disconnect_all();
}

#[tokio::test]
async fn rapid_resubscribe_leaves_one_session() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    for _ in 0..3 {
        coordinator.subscribe(topic.clone()).unwrap();
    }

    states_until(&mut changes, topic.id, Connected).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = coordinator.status(topic.id).unwrap();
    assert_eq!(status.state, Connected);
    assert!(status.session_active);
    assert!(!status.retry_pending);
    assert_eq!(coordinator.topic_ids(), vec![topic.id]);
    // Superseded sessions never report Connected.
    while let Ok(change) = changes.try_recv() {
        assert_ne!(change.state, Connected, "stale session reported state");
    }
    coordinator.disconnect_all();
}

#[tokio::test]
async fn unsubscribe_then_subscribe_cancels_pending_retry() {
    let server = TestServer::start(vec![Behaviour::status(500)]).await;
    let topic = server.topic("alerts");
    let mut config = fast_config();
    config.policy.base = Duration::from_secs(30);
    config.policy.cap = Duration::from_secs(30);
    let (coordinator, _messages) = Coordinator::new(config, Arc::new(NoCredentials)).unwrap();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Reconnecting { attempt: 1 }).await;
    assert!(coordinator.status(topic.id).unwrap().retry_pending);

    coordinator.unsubscribe(topic.id);
    assert_eq!(next_state(&mut changes, topic.id).await, Disconnected);
    assert!(coordinator.status(topic.id).is_none());

    server.set_script(vec![Behaviour::hold_open(Vec::<String>::new())]);
    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Connected).await;

    let status = coordinator.status(topic.id).unwrap();
    assert!(status.session_active);
    assert!(!status.retry_pending);
    assert_eq!(status.failures, 0);
    assert_eq!(server.connection_count(), 2);
    coordinator.disconnect_all();
}

#[tokio::test]
async fn unsubscribe_removes_state_cell() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();
    let cell = coordinator.watch(topic.id);

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Connected).await;
    coordinator.unsubscribe(topic.id);

    assert_eq!(*cell.borrow(), Disconnected);
    assert!(cell.has_changed().is_err());
    assert_eq!(coordinator.connection_state(topic.id), Disconnected);
}

#[tokio::test]
async fn unsubscribe_closes_server_connection() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Connected).await;
    server.wait_open_connections(1).await;

    coordinator.unsubscribe(topic.id);
    server.wait_open_connections(0).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn replacing_subscribe_closes_previous_connection() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let topic = server.topic("alerts");
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Connected).await;
    server.wait_open_connections(1).await;

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Connected).await;
    assert_eq!(server.connection_count(), 2);
    server.wait_open_connections(1).await;

    // Stays at one once the old socket is gone.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.open_connections(), 1);

    coordinator.disconnect_all();
    server.wait_open_connections(0).await;
}

#[tokio::test]
async fn disconnect_all_stops_streams_and_timers() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    server.set_topic_script("broken", vec![Behaviour::status(500)]);
    let live = server.topic("live");
    let broken = server.topic("broken");

    let mut config = fast_config();
    config.policy.base = Duration::from_secs(30);
    config.policy.cap = Duration::from_secs(30);
    let (coordinator, _messages) = Coordinator::new(config, Arc::new(NoCredentials)).unwrap();
    let mut live_changes = coordinator.state_changes();
    let mut broken_changes = coordinator.state_changes();

    coordinator.subscribe(live.clone()).unwrap();
    coordinator.subscribe(broken.clone()).unwrap();
    states_until(&mut live_changes, live.id, Connected).await;
    states_until(&mut broken_changes, broken.id, Reconnecting { attempt: 1 }).await;
    server.wait_open_connections(1).await;

    coordinator.disconnect_all();

    assert_eq!(next_state(&mut live_changes, live.id).await, Disconnected);
    assert_eq!(next_state(&mut broken_changes, broken.id).await, Disconnected);
    assert_eq!(coordinator.connection_state(live.id), Disconnected);
    assert_eq!(coordinator.connection_state(broken.id), Disconnected);
    assert!(coordinator.topic_ids().is_empty());

    server.wait_open_connections(0).await;
    let before = server.connection_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connection_count(), before);
    assert_eq!(server.open_connections(), 0);
}

#[tokio::test]
async fn reconnect_all_revives_failed_topic() {
    let server = TestServer::start(vec![Behaviour::status(500)]).await;
    let topic = server.topic("alerts");
    let mut config = fast_config();
    config.policy.max_attempts = 2;
    let (coordinator, _messages) = Coordinator::new(config, Arc::new(NoCredentials)).unwrap();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();
    states_until(&mut changes, topic.id, Failed).await;
    assert_eq!(coordinator.status(topic.id).unwrap().failures, 2);

    server.set_script(vec![Behaviour::hold_open(Vec::<String>::new())]);
    let started = coordinator.reconnect_all(std::slice::from_ref(&topic));

    assert_eq!(started, 1);
    assert_eq!(
        states_until(&mut changes, topic.id, Connected).await,
        vec![Connecting, Connected]
    );
    assert_eq!(coordinator.status(topic.id).unwrap().failures, 0);
    coordinator.disconnect_all();
}

#[tokio::test]
async fn invalid_topic_is_rejected_without_state_change() {
    let (coordinator, _messages) = coordinator();
    let mut changes = coordinator.state_changes();
    let topic = Topic::new("   ");

    assert!(matches!(
        coordinator.subscribe(topic.clone()),
        Err(NtfyError::InvalidTopic(_))
    ));
    assert!(coordinator.status(topic.id).is_none());
    assert!(changes.try_recv().is_err());
    assert_eq!(coordinator.reconnect_all(&[topic]), 0);
}

#[tokio::test]
async fn sends_basic_auth_only_with_username_and_password() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let private = server.topic("private").with_username("phil");
    let nopass = server.topic("nopass").with_username("phil");
    let public = server.topic("public");
    let private_id = private.id;

    let lookup = move |id: Uuid| (id == private_id).then(|| "mypass".to_string());
    let (coordinator, _messages) = Coordinator::new(fast_config(), Arc::new(lookup)).unwrap();
    let mut changes = coordinator.state_changes();

    for topic in [&private, &nopass, &public] {
        coordinator.subscribe(topic.clone()).unwrap();
        states_until(&mut changes, topic.id, Connected).await;
    }

    let mut requests = server.requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            ("nopass".to_string(), None),
            (
                "private".to_string(),
                Some("Basic cGhpbDpteXBhc3M=".to_string())
            ),
            ("public".to_string(), None),
        ]
    );
    coordinator.disconnect_all();
}

#[tokio::test]
async fn keepalive_timeout_counts_as_failure() {
    let server = TestServer::start(vec![Behaviour::hold_open(Vec::<String>::new())]).await;
    let topic = server.topic("alerts");
    let mut config = fast_config();
    config.keepalive_timeout = Duration::from_millis(100);
    let (coordinator, _messages) = Coordinator::new(config, Arc::new(NoCredentials)).unwrap();
    let mut changes = coordinator.state_changes();

    coordinator.subscribe(topic.clone()).unwrap();

    assert_eq!(
        states_until(&mut changes, topic.id, Reconnecting { attempt: 1 }).await,
        vec![Connecting, Connected, Disconnected, Reconnecting { attempt: 1 }]
    );
    coordinator.disconnect_all();
}
