//! Integration test: drives a real [`RealtimeClient`] over an in-memory
//! connector and asserts the session loop end to end:
//!
//! - the queue bootstrap is the first publish, followed by presence
//! - cursor-only delta frames advance the cursor without events
//! - decoded messages reach registered listeners in order
//! - responses are correlated by request id, out of order
//! - a lost stream triggers a full resync with a fresh device id
//! - the periodic timer rebuilds the session without losing queued events
//! - stop and non-reconnecting stream loss both end with `disconnect`

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ec_protocol::topics;
use ec_realtime::{
    listener_fn, ConnectOptions, ConnectionState, Connector, Event, EventKind, EventListener,
    Frame, Link, LinkPublisher, ListenerRegistry, Outbound, RealtimeClient, RealtimeConfig,
    RealtimeError, SequenceSource, SessionCredentials,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

const USER_ID: &str = "100012345";
const WAIT: Duration = Duration::from_secs(5);

// ── In-memory connector ─────────────────────────────────────────────────

/// The far side of one connection, handed to the test.
struct Remote {
    frames: mpsc::Sender<Frame>,
    outbound: mpsc::Receiver<Outbound>,
    device_id: String,
}

impl Remote {
    async fn push(&self, topic: &str, payload: Value) {
        let bytes = serde_json::to_vec(&payload).unwrap();
        self.frames.send(Frame::new(topic, bytes)).await.unwrap();
    }

    async fn next_out(&mut self) -> Outbound {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for a publish")
            .expect("link closed")
    }

    /// Skip the bootstrap and presence publishes.
    async fn drain_handshake(&mut self) {
        for _ in 0..3 {
            self.next_out().await;
        }
    }
}

struct MemoryConnector {
    remotes: mpsc::UnboundedSender<Remote>,
    /// Successful connects.
    connects: AtomicU32,
    /// Every call, failed or not.
    attempts: AtomicU32,
    fail_next: AtomicBool,
    /// Refuse every connect while set.
    refuse: AtomicBool,
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        credentials: &SessionCredentials,
        _options: &ConnectOptions,
    ) -> Result<Link, RealtimeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) || self.refuse.load(Ordering::SeqCst) {
            return Err(RealtimeError::Transport("injected connect failure".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let (out_tx, out_rx) = mpsc::channel(64);
        let (frames_tx, frames_rx) = mpsc::channel(64);
        let _ = self.remotes.send(Remote {
            frames: frames_tx,
            outbound: out_rx,
            device_id: credentials.device_id.clone(),
        });
        Ok(Link {
            publisher: LinkPublisher::new(out_tx),
            frames: frames_rx,
            close: CancellationToken::new(),
        })
    }
}

/// Returns 100, 200, 300, ... on successive fetches.
#[derive(Default)]
struct SteppingSequence {
    calls: AtomicI64,
}

#[async_trait::async_trait]
impl SequenceSource for SteppingSequence {
    async fn fetch_sequence_id(&self, _credentials: &SessionCredentials) -> Result<i64, RealtimeError> {
        Ok((self.calls.fetch_add(1, Ordering::SeqCst) + 1) * 100)
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    kind: EventKind,
    detail: Option<String>,
}

struct Harness {
    client: RealtimeClient,
    connector: Arc<MemoryConnector>,
    sequence: Arc<SteppingSequence>,
    remotes: mpsc::UnboundedReceiver<Remote>,
    events: mpsc::UnboundedReceiver<Seen>,
}

impl Harness {
    async fn next_remote(&mut self) -> Remote {
        tokio::time::timeout(WAIT, self.remotes.recv())
            .await
            .expect("timed out waiting for a connect")
            .expect("connector dropped")
    }

    async fn next_event(&mut self) -> Seen {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("listener dropped")
    }
}

fn test_config() -> RealtimeConfig {
    let mut config = RealtimeConfig::default();
    config.heartbeat.enabled = false;
    config.reconnect.periodic = false;
    config.reconnect.settle_delay_secs = 0;
    config.reconnect.retry_min_secs = 0;
    config.reconnect.retry_max_secs = 0;
    config
}

fn harness(config: RealtimeConfig) -> Harness {
    harness_with(
        config,
        SessionCredentials::new(USER_ID, "c_user=100012345; xs=abc"),
    )
}

fn harness_with(config: RealtimeConfig, credentials: SessionCredentials) -> Harness {
    let (remote_tx, remotes) = mpsc::unbounded_channel();
    let connector = Arc::new(MemoryConnector {
        remotes: remote_tx,
        connects: AtomicU32::new(0),
        attempts: AtomicU32::new(0),
        fail_next: AtomicBool::new(false),
        refuse: AtomicBool::new(false),
    });
    let sequence = Arc::new(SteppingSequence::default());

    let (event_tx, events) = mpsc::unbounded_channel();
    let listeners = Arc::new(ListenerRegistry::new());
    for kind in [
        EventKind::Listening,
        EventKind::Reconnect,
        EventKind::Disconnect,
        EventKind::Message,
        EventKind::Error,
    ] {
        let tx = event_tx.clone();
        listeners.register(
            kind,
            listener_fn(move |event| {
                let detail = event
                    .message()
                    .map(|m| m.text.clone())
                    .or_else(|| event.reason().map(str::to_string));
                let _ = tx.send(Seen {
                    kind: event.kind,
                    detail,
                });
                Ok(())
            }),
        );
    }

    let client = RealtimeClient::builder()
        .credentials(credentials)
        .config(config)
        .connector_boxed(connector.clone())
        .sequence_source_boxed(sequence.clone())
        .listeners(listeners)
        .build()
        .unwrap();

    Harness {
        client,
        connector,
        sequence,
        remotes,
        events,
    }
}

fn body(out: &Outbound) -> Value {
    serde_json::from_slice(&out.payload).unwrap()
}

fn new_message(text: &str) -> Value {
    new_messages(&[text])
}

/// One delta frame carrying a `NewMessage` per text.
fn new_messages(texts: &[&str]) -> Value {
    let deltas: Vec<Value> = texts
        .iter()
        .map(|text| {
            json!({
                "class": "NewMessage",
                "messageMetadata": {
                    "messageId": "mid.$abc",
                    "actorFbId": "42",
                    "timestamp": "1700000000000",
                    "threadKey": { "threadFbId": "123" }
                },
                "body": text
            })
        })
        .collect();
    json!({ "deltas": deltas })
}

/// Holds every message listener behind it until permits are added.
struct Gate(Arc<Semaphore>);

#[async_trait::async_trait]
impl EventListener for Gate {
    async fn on_event(&self, _event: &Event) -> anyhow::Result<()> {
        let _permit = self.0.acquire().await?;
        Ok(())
    }
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Startup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn bootstrap_is_first_publish_then_presence() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    assert_eq!(h.client.state(), ConnectionState::Connected);

    let mut remote = h.next_remote().await;

    let bootstrap = remote.next_out().await;
    assert_eq!(bootstrap.topic, topics::CREATE_QUEUE);
    assert_eq!(bootstrap.qos, ec_realtime::QoS::AtLeastOnce);
    let doc = body(&bootstrap);
    assert_eq!(doc["initial_titan_sequence_id"], "100");
    assert_eq!(doc["entity_fbid"], USER_ID);
    assert_eq!(doc["sync_api_version"], 10);

    let settings = remote.next_out().await;
    assert_eq!(settings.topic, topics::CLIENT_SETTINGS);
    assert_eq!(body(&settings)["make_user_available_when_in_foreground"], true);

    let foreground = remote.next_out().await;
    assert_eq!(foreground.topic, topics::FOREGROUND_STATE);
    assert_eq!(body(&foreground)["foreground"], true);

    assert_eq!(h.next_event().await.kind, EventKind::Listening);
    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn offline_session_skips_presence() {
    let mut config = test_config();
    config.session.chat_on = false;
    let mut h = harness(config);
    h.client.start().await.unwrap();

    let mut remote = h.next_remote().await;
    assert_eq!(remote.next_out().await.topic, topics::CREATE_QUEUE);

    // Nothing else is published before the first request.
    let sender = h.client.clone();
    let request = tokio::spawn(async move {
        sender
            .send(0, Bytes::from_static(b"{}"), Some(Duration::from_millis(50)))
            .await
    });
    assert_eq!(remote.next_out().await.topic, topics::REQUESTS);
    assert!(request.await.unwrap().is_err());

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn failed_first_connect_is_returned_and_restartable() {
    let mut h = harness(test_config());
    h.connector.fail_next.store(true, Ordering::SeqCst);

    let err = h.client.start().await.unwrap_err();
    assert!(matches!(err, RealtimeError::Transport(_)));
    assert_eq!(h.client.state(), ConnectionState::Disconnected);

    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    // Baseline was fetched once per attempt.
    assert_eq!(body(&remote.next_out().await)["initial_titan_sequence_id"], "200");

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let _remote = h.next_remote().await;
    assert!(matches!(h.client.start().await, Err(RealtimeError::Config(_))));
    h.client.stop();
    h.client.wait().await;
    assert!(matches!(h.client.start().await, Err(RealtimeError::Shutdown)));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Receive path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn cursor_frame_advances_sequence_without_event() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let remote = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    remote
        .push(topics::DELTAS, json!({ "lastIssuedSeqId": 500 }))
        .await;
    remote.push(topics::DELTAS, new_message("hi")).await;

    // The message is the very next event: the cursor frame produced none.
    let seen = h.next_event().await;
    assert_eq!(seen.kind, EventKind::Message);
    assert_eq!(seen.detail.as_deref(), Some("hi"));
    assert_eq!(h.client.cursor().sequence_id, Some(500));

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn events_arrive_in_frame_order() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let remote = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    for text in ["one", "two", "three"] {
        remote.push(topics::DELTAS, new_message(text)).await;
    }
    for text in ["one", "two", "three"] {
        assert_eq!(h.next_event().await.detail.as_deref(), Some(text));
    }

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn failing_listener_reports_error_and_dispatch_continues() {
    let mut h = harness(test_config());
    h.client.listeners().register(
        EventKind::Message,
        listener_fn(|event| match event.message() {
            Some(m) if m.text == "bad" => Err(anyhow::anyhow!("cannot handle")),
            _ => Ok(()),
        }),
    );
    h.client.start().await.unwrap();
    let remote = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    remote.push(topics::DELTAS, new_message("bad")).await;
    remote.push(topics::DELTAS, new_message("good")).await;

    assert_eq!(h.next_event().await.detail.as_deref(), Some("bad"));
    let error = h.next_event().await;
    assert_eq!(error.kind, EventKind::Error);
    assert_eq!(
        error.detail.as_deref(),
        Some("message listener failed: cannot handle")
    );
    assert_eq!(h.next_event().await.detail.as_deref(), Some("good"));

    h.client.stop();
    h.client.wait().await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request correlation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn responses_resolve_out_of_order() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;

    let first = {
        let client = h.client.clone();
        tokio::spawn(async move { client.send(1, Bytes::from_static(b"{\"request_id\":1}"), None).await })
    };
    assert_eq!(remote.next_out().await.topic, topics::REQUESTS);
    let second = {
        let client = h.client.clone();
        tokio::spawn(async move { client.send(2, Bytes::from_static(b"{\"request_id\":2}"), None).await })
    };
    assert_eq!(remote.next_out().await.topic, topics::REQUESTS);
    assert_eq!(h.client.pending_requests(), 2);

    remote
        .push(topics::RESPONSES, json!({ "request_id": 999, "payload": "stray" }))
        .await;
    remote
        .push(topics::RESPONSES, json!({ "request_id": 2, "payload": "B" }))
        .await;
    remote
        .push(topics::RESPONSES, json!({ "request_id": 1, "payload": "A" }))
        .await;

    assert_eq!(second.await.unwrap().unwrap().payload, "B");
    assert_eq!(first.await.unwrap().unwrap().payload, "A");
    assert_eq!(h.client.pending_requests(), 0);

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn request_timeout_removes_waiter() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;

    let err = h
        .client
        .send(7, Bytes::from_static(b"{}"), Some(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, RealtimeError::Timeout { request_id: 7 }));
    assert_eq!(h.client.pending_requests(), 0);

    // A late reply is discarded without disturbing the session.
    remote
        .push(topics::RESPONSES, json!({ "request_id": 7, "payload": "late" }))
        .await;
    remote.push(topics::DELTAS, new_message("still here")).await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);
    assert_eq!(h.next_event().await.detail.as_deref(), Some("still here"));

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn task_batch_uses_envelope_request_id() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;

    let task_id = h.client.next_task_id();
    assert_eq!(task_id, 0);
    let task = ec_realtime::Task::new(task_id, "46", "send_typing", &json!({ "thread_key": 1 }))
        .unwrap();

    let client = h.client.clone();
    let pending = tokio::spawn(async move { client.send_tasks(vec![task], None).await });

    let out = remote.next_out().await;
    assert_eq!(out.topic, topics::REQUESTS);
    let envelope = body(&out);
    assert_eq!(envelope["type"], 3);
    let request_id = envelope["request_id"].as_u64().unwrap();
    assert_eq!(request_id, 0);

    remote
        .push(topics::RESPONSES, json!({ "request_id": request_id, "payload": "{}" }))
        .await;
    assert_eq!(pending.await.unwrap().unwrap().request_id, request_id);

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn request_envelope_carries_credentials_app_id() {
    let credentials =
        SessionCredentials::new(USER_ID, "c_user=100012345; xs=abc").with_app_id("555");
    let mut h = harness_with(test_config(), credentials);
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;

    let client = h.client.clone();
    let pending = tokio::spawn(async move {
        client
            .request(3, &json!({}), Some(Duration::from_millis(50)))
            .await
    });
    assert_eq!(body(&remote.next_out().await)["app_id"], "555");
    assert!(pending.await.unwrap().is_err());

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn configured_app_id_overrides_credentials() {
    let mut config = test_config();
    config.endpoint.app_id = Some("777".into());
    let credentials =
        SessionCredentials::new(USER_ID, "c_user=100012345; xs=abc").with_app_id("555");
    let mut h = harness_with(config, credentials);
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;

    let client = h.client.clone();
    let pending = tokio::spawn(async move {
        client
            .request(3, &json!({}), Some(Duration::from_millis(50)))
            .await
    });
    assert_eq!(body(&remote.next_out().await)["app_id"], "777");
    assert!(pending.await.unwrap().is_err());

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn stop_fails_pending_requests() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let mut remote = h.next_remote().await;
    remote.drain_handshake().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    let client = h.client.clone();
    let pending = tokio::spawn(async move { client.send(3, Bytes::from_static(b"{}"), None).await });
    remote.next_out().await;

    h.client.stop();
    assert!(matches!(pending.await.unwrap(), Err(RealtimeError::Shutdown)));

    let seen = h.next_event().await;
    assert_eq!(seen.kind, EventKind::Disconnect);
    assert_eq!(seen.detail.as_deref(), Some("stopped"));
    h.client.wait().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        h.client.publish("/t_ms", Bytes::new()).await,
        Err(RealtimeError::Shutdown)
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn stream_end_triggers_full_resync() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let mut first = h.next_remote().await;
    first.drain_handshake().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    first
        .push(
            topics::DELTAS,
            json!({ "lastIssuedSeqId": 150, "syncToken": "tok-1" }),
        )
        .await;
    let client = h.client.clone();
    wait_for(move || client.cursor().sync_token.as_deref() == Some("tok-1")).await;

    let first_device = first.device_id.clone();
    drop(first);

    let mut second = h.next_remote().await;
    assert_ne!(second.device_id, first_device);

    // Token dropped, sequence re-fetched: a fresh create-queue.
    let bootstrap = second.next_out().await;
    assert_eq!(bootstrap.topic, topics::CREATE_QUEUE);
    assert_eq!(body(&bootstrap)["initial_titan_sequence_id"], "200");
    assert_eq!(h.sequence.calls.load(Ordering::SeqCst), 2);

    assert_eq!(h.next_event().await.kind, EventKind::Reconnect);
    assert_eq!(h.client.state(), ConnectionState::Connected);
    assert_eq!(h.client.cursor().sync_token, None);

    second.push(topics::DELTAS, new_message("after")).await;
    assert_eq!(h.next_event().await.detail.as_deref(), Some("after"));

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn failed_rebuild_is_retried() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let first = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    h.connector.refuse.store(true, Ordering::SeqCst);
    drop(first);

    // Several rebuilds fail; the session keeps trying and never gives up.
    let connector = h.connector.clone();
    wait_for(move || connector.attempts.load(Ordering::SeqCst) >= 4).await;
    assert_eq!(h.client.state(), ConnectionState::Reconnecting);
    assert!(h.events.try_recv().is_err());

    h.connector.refuse.store(false, Ordering::SeqCst);
    let mut second = h.next_remote().await;
    assert_eq!(second.next_out().await.topic, topics::CREATE_QUEUE);
    assert_eq!(h.next_event().await.kind, EventKind::Reconnect);
    assert_eq!(h.client.state(), ConnectionState::Connected);
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 2);

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn stop_while_reconnecting_ends_session() {
    let mut h = harness(test_config());
    h.client.start().await.unwrap();
    let first = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    h.connector.refuse.store(true, Ordering::SeqCst);
    drop(first);
    let client = h.client.clone();
    wait_for(move || client.state() == ConnectionState::Reconnecting).await;

    h.client.stop();
    tokio::time::timeout(WAIT, h.client.wait()).await.unwrap();

    let seen = h.next_event().await;
    assert_eq!(seen.kind, EventKind::Disconnect);
    assert_eq!(seen.detail.as_deref(), Some("stopped"));
    assert_eq!(h.client.state(), ConnectionState::Disconnected);

    // No rebuild after stop, even once the connector recovers.
    h.connector.refuse.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
    assert!(h.remotes.try_recv().is_err());
}

#[tokio::test]
async fn periodic_timer_rebuilds_with_fresh_cursor() {
    let mut config = test_config();
    config.reconnect.periodic = true;
    config.reconnect.min_interval_secs = 1;
    config.reconnect.max_interval_secs = 1;
    let mut h = harness(config);
    h.client.start().await.unwrap();
    let mut first = h.next_remote().await;
    first.drain_handshake().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    first
        .push(
            topics::DELTAS,
            json!({ "lastIssuedSeqId": 150, "syncToken": "tok-1" }),
        )
        .await;
    let client = h.client.clone();
    wait_for(move || client.cursor().sync_token.as_deref() == Some("tok-1")).await;

    // The old link stays open; only the timer tears it down.
    let mut second = h.next_remote().await;
    assert_ne!(second.device_id, first.device_id);

    let bootstrap = second.next_out().await;
    assert_eq!(bootstrap.topic, topics::CREATE_QUEUE);
    assert_eq!(body(&bootstrap)["initial_titan_sequence_id"], "200");
    assert_eq!(h.sequence.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.next_event().await.kind, EventKind::Reconnect);
    assert_eq!(h.client.cursor().sync_token, None);

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn periodic_reconnect_keeps_every_event_of_a_frame() {
    let mut config = test_config();
    config.session.queue_capacity = 1;
    config.reconnect.periodic = true;
    config.reconnect.min_interval_secs = 1;
    config.reconnect.max_interval_secs = 1;
    let mut h = harness(config);
    let gate = Arc::new(Semaphore::new(0));
    h.client
        .listeners()
        .register(EventKind::Message, Gate(gate.clone()));

    h.client.start().await.unwrap();
    let remote = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    // "a" parks in the gate, "b" fills the queue, "c" blocks the producer.
    remote
        .push(topics::DELTAS, new_messages(&["a", "b", "c"]))
        .await;
    assert_eq!(h.next_event().await.detail.as_deref(), Some("a"));

    // Let the periodic deadline pass while the frame is still in flight.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);

    gate.add_permits(3);
    assert_eq!(h.next_event().await.detail.as_deref(), Some("b"));
    assert_eq!(h.next_event().await.detail.as_deref(), Some("c"));
    assert_eq!(h.next_event().await.kind, EventKind::Reconnect);
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 2);

    h.client.stop();
    h.client.wait().await;
}

#[tokio::test]
async fn stream_end_without_auto_reconnect_disconnects() {
    let mut config = test_config();
    config.reconnect.auto_reconnect = false;
    let mut h = harness(config);
    h.client.start().await.unwrap();
    let remote = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);

    drop(remote);

    let seen = h.next_event().await;
    assert_eq!(seen.kind, EventKind::Disconnect);
    assert_eq!(seen.detail.as_deref(), Some("stream ended"));
    h.client.wait().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn state_transitions_are_observable() {
    let mut h = harness(test_config());
    let mut states = h.client.watch_state();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let s = *states.borrow_and_update();
            log.lock().push(s);
            if s == ConnectionState::Disconnected {
                break;
            }
        }
    });

    h.client.start().await.unwrap();
    let first = h.next_remote().await;
    drop(first);
    let _second = h.next_remote().await;
    assert_eq!(h.next_event().await.kind, EventKind::Listening);
    assert_eq!(h.next_event().await.kind, EventKind::Reconnect);

    h.client.stop();
    h.client.wait().await;
    tokio::time::timeout(WAIT, watcher).await.unwrap().unwrap();

    // Watch coalesces fast transitions; only the terminal state is certain.
    let seen = seen.lock().clone();
    assert!(!seen.is_empty());
    assert_eq!(seen.last(), Some(&ConnectionState::Disconnected));
}
