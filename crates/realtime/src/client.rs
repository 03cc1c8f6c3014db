//! Session facade: owns the cursor, correlator, listener registry and the
//! supervisor task that keeps one live link at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ec_deltas::error::{excerpt, DEFAULT_EXCERPT_LIMIT};
use ec_deltas::{DeltaDecoder, Event, EventKind};
use ec_protocol::envelope::TASK_REQUEST_TYPE;
use ec_protocol::{QoS, RequestEnvelope, ResponseEnvelope, Task, TaskBatch, TopicClass};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::baseline::SequenceSource;
use crate::config::RealtimeConfig;
use crate::correlator::RequestCorrelator;
use crate::cursor::{Cursor, CursorTracker};
use crate::dispatcher::{Dispatcher, EventQueue};
use crate::heartbeat::{publish_presence, spawn_heartbeat};
use crate::reconnect::ReconnectPolicy;
use crate::registry::ListenerRegistry;
use crate::transport::{ConnectOptions, Connector, Frame, Link, LinkPublisher};
use crate::types::{ConnectionState, RealtimeError, SessionCredentials};

/// A realtime session. Cheap to clone; all clones drive the same session.
///
/// Create via [`RealtimeClientBuilder`](crate::builder::RealtimeClientBuilder).
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: RealtimeConfig,
    credentials: Mutex<SessionCredentials>,
    connector: Arc<dyn Connector>,
    sequence_source: Arc<dyn SequenceSource>,
    listeners: Arc<ListenerRegistry>,
    decoder: DeltaDecoder,
    policy: ReconnectPolicy,

    cursor: CursorTracker,
    correlator: RequestCorrelator,
    state: watch::Sender<ConnectionState>,
    publisher: Mutex<Option<LinkPublisher>>,

    started: AtomicBool,
    shutdown: CancellationToken,
    /// Cancelled when the supervisor exits, however it exits.
    finished: CancellationToken,
}

/// Why the supervisor left the steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Stopped,
    StreamEnded,
    Periodic,
}

impl RealtimeClient {
    /// Start a new builder.
    pub fn builder() -> crate::builder::RealtimeClientBuilder {
        crate::builder::RealtimeClientBuilder::new()
    }

    pub(crate) fn from_parts(
        config: RealtimeConfig,
        credentials: SessionCredentials,
        connector: Arc<dyn Connector>,
        sequence_source: Arc<dyn SequenceSource>,
        listeners: Arc<ListenerRegistry>,
        decoder: DeltaDecoder,
    ) -> Self {
        let policy = ReconnectPolicy::from(&config.reconnect);
        let correlator = RequestCorrelator::new(config.session.request_timeout());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                credentials: Mutex::new(credentials),
                connector,
                sequence_source,
                listeners,
                decoder,
                policy,
                cursor: CursorTracker::new(),
                correlator,
                state,
                publisher: Mutex::new(None),
                started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                finished: CancellationToken::new(),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Fetch the cursor seed, connect, bootstrap the queue, and spawn the
    /// background tasks.
    ///
    /// Connect-time failures are returned here and nothing keeps running;
    /// `start` may then be called again. Once it succeeds, network loss is
    /// handled by the supervisor.
    pub async fn start(&self) -> Result<(), RealtimeError> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(RealtimeError::Shutdown);
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(RealtimeError::Config("session already started".into()));
        }

        inner.set_state(ConnectionState::Connecting);
        let (queue, dispatcher) = Dispatcher::spawn(
            inner.listeners.clone(),
            inner.config.session.queue_capacity,
        );

        let link = match inner.first_connect().await {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(error = %e, "realtime session failed to start");
                dispatcher.shutdown().await;
                inner.started.store(false, Ordering::SeqCst);
                inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        inner.set_state(ConnectionState::Connected);
        queue.push(Event::lifecycle(EventKind::Listening)).await;
        tracing::info!(user_id = %inner.user_id(), "listening");

        tokio::spawn(supervise(inner.clone(), link, queue, dispatcher));
        Ok(())
    }

    /// Wait until the session ends (after [`stop`](Self::stop), or a
    /// stream end with auto-reconnect disabled). Returns immediately when
    /// the session is not running. Any number of callers may wait.
    pub async fn wait(&self) {
        let inner = &self.inner;
        let mut state = inner.state.subscribe();
        loop {
            if inner.finished.is_cancelled() || !inner.started.load(Ordering::SeqCst) {
                return;
            }
            tokio::select! {
                _ = inner.finished.cancelled() => return,
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Terminal stop: cancels every background task, closes the link, and
    /// fails pending requests immediately. The session never reconnects.
    pub fn stop(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        tracing::info!(user_id = %self.inner.user_id(), "stopping realtime session");
        self.inner.shutdown.cancel();
        self.inner.correlator.fail_all();
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Publish raw bytes on `topic` at QoS 1.
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> Result<(), RealtimeError> {
        self.publish_qos(topic, payload, QoS::AtLeastOnce).await
    }

    pub async fn publish_qos(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
    ) -> Result<(), RealtimeError> {
        self.inner.current_publisher()?.publish(topic, payload, qos).await
    }

    /// Publish a payload that embeds `request_id` on the request topic and
    /// wait for the matching response. `timeout` defaults to the configured
    /// request timeout.
    pub async fn send(
        &self,
        request_id: u64,
        payload: impl Into<Bytes>,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, RealtimeError> {
        let publisher = self.inner.current_publisher()?;
        self.inner
            .correlator
            .send(&publisher, request_id, payload, timeout)
            .await
    }

    /// Wrap `inner` in a request envelope under a fresh request id and send it.
    pub async fn request<T: Serialize>(
        &self,
        kind: u32,
        inner: &T,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, RealtimeError> {
        let request_id = self.next_request_id();
        let envelope = RequestEnvelope::new(self.inner.app_id(), request_id, kind, inner)?;
        self.send(request_id, envelope.to_bytes()?, timeout).await
    }

    /// Send a batch of tasks as one `type = 3` request.
    pub async fn send_tasks(
        &self,
        tasks: Vec<Task>,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, RealtimeError> {
        self.request(TASK_REQUEST_TYPE, &TaskBatch::new(tasks), timeout)
            .await
    }

    pub fn next_request_id(&self) -> u64 {
        self.inner.correlator.next_request_id()
    }

    pub fn next_task_id(&self) -> u64 {
        self.inner.correlator.next_task_id()
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn cursor(&self) -> Cursor {
        self.inner.cursor.snapshot()
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.inner.listeners
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }
}

impl Inner {
    fn user_id(&self) -> String {
        self.credentials.lock().user_id.clone()
    }

    /// Envelope `app_id`: the config override, else the credentials'.
    fn app_id(&self) -> String {
        match &self.config.endpoint.app_id {
            Some(id) => id.clone(),
            None => self.credentials.lock().app_id.clone(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let prev = self.state.send_replace(state);
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "connection state");
        }
    }

    fn options(&self) -> ConnectOptions {
        ConnectOptions {
            chat_on: self.config.session.chat_on,
            foreground: self.config.session.foreground,
        }
    }

    fn current_publisher(&self) -> Result<LinkPublisher, RealtimeError> {
        if self.shutdown.is_cancelled() {
            return Err(RealtimeError::Shutdown);
        }
        self.publisher
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConnected)
    }

    async fn first_connect(&self) -> Result<Link, RealtimeError> {
        let credentials = self.credentials.lock().clone();
        let seq = self.sequence_source.fetch_sequence_id(&credentials).await?;
        self.cursor.seed(seq);
        self.open_link().await
    }

    /// Connect and send the queue bootstrap (plus presence when online).
    /// On any failure the half-built link is dropped, which closes it.
    async fn open_link(&self) -> Result<Link, RealtimeError> {
        let credentials = self.credentials.lock().clone();
        let options = self.options();
        let link = self.connector.connect(&credentials, &options).await?;

        let bootstrap = self
            .cursor
            .bootstrap(&credentials.user_id)
            .ok_or_else(|| RealtimeError::Config("cursor has no sequence id".into()))?;
        link.publisher
            .publish(bootstrap.topic(), bootstrap.to_bytes()?, QoS::AtLeastOnce)
            .await?;
        tracing::info!(topic = bootstrap.topic(), "queue bootstrap sent");

        if options.chat_on {
            publish_presence(&link.publisher, &options).await?;
        }

        *self.publisher.lock() = Some(link.publisher.clone());
        Ok(link)
    }

    /// One rebuild: settle, new device id, fresh sequence id, full resync.
    async fn reconnect_once(&self) -> Result<Link, RealtimeError> {
        tokio::time::sleep(self.policy.settle_delay).await;
        let credentials = {
            let mut creds = self.credentials.lock();
            creds.regenerate_device_id();
            creds.clone()
        };
        let seq = self.sequence_source.fetch_sequence_id(&credentials).await?;
        self.cursor.reset_for_reconnect(seq);
        self.open_link().await
    }

    /// Retry [`reconnect_once`](Self::reconnect_once) until it succeeds.
    /// `Ok(None)` means the session was stopped mid-flight.
    async fn reconnect(&self) -> Result<Option<Link>, RealtimeError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(None),
                r = self.reconnect_once() => r,
            };
            match result {
                Ok(link) => {
                    tracing::info!(attempt, "reconnected");
                    return Ok(Some(link));
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    let delay = self.policy.retry_delay();
                    tracing::warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "reconnect failed"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Drain one link's frames: advance the cursor, resolve responses,
    /// decode everything else onto the dispatch queue.
    ///
    /// Returns when the frame stream ends or the periodic deadline passes.
    /// The deadline is only checked between frames: once a frame is taken
    /// off the link, all of its events are queued.
    async fn receive_loop(
        &self,
        frames: &mut mpsc::Receiver<Frame>,
        queue: &EventQueue,
        periodic: Option<Duration>,
    ) -> Wake {
        let deadline = periodic.map(|d| Instant::now() + d);
        loop {
            let frame = tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => return Wake::StreamEnded,
                },
                _ = sleep_until_or_never(deadline) => return Wake::Periodic,
            };

            match TopicClass::of(&frame.topic) {
                TopicClass::Deltas => {
                    self.cursor.observe(&frame.payload);
                }
                TopicClass::Response => {
                    match ResponseEnvelope::decode(&frame.payload) {
                        Ok(response) => {
                            self.correlator.resolve(response);
                        }
                        Err(e) => tracing::warn!(
                            topic = %frame.topic,
                            error = %e,
                            payload = %excerpt(&frame.payload, DEFAULT_EXCERPT_LIMIT),
                            "dropping undecodable response"
                        ),
                    }
                    continue;
                }
                _ => {}
            }

            for event in self.decoder.decode_events(&frame.topic, &frame.payload) {
                if !queue.push(event).await {
                    return Wake::Stopped;
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn supervise(inner: Arc<Inner>, mut link: Link, queue: EventQueue, dispatcher: Dispatcher) {
    let _finished = inner.finished.clone().drop_guard();
    let reason = loop {
        let heartbeat_stop = inner.shutdown.child_token();
        let heartbeat = inner.config.heartbeat.enabled.then(|| {
            spawn_heartbeat(
                link.publisher.clone(),
                inner.config.heartbeat.interval(),
                inner.options(),
                heartbeat_stop.clone(),
            )
        });
        let periodic = inner.policy.next_interval();

        let wake = tokio::select! {
            _ = inner.shutdown.cancelled() => Wake::Stopped,
            wake = inner.receive_loop(&mut link.frames, &queue, periodic) => wake,
        };

        // Receive loop is gone with the select; then the heartbeat, then
        // the link.
        heartbeat_stop.cancel();
        if let Some(handle) = heartbeat {
            let _ = handle.await;
        }
        *inner.publisher.lock() = None;
        link.close();

        match wake {
            Wake::Stopped => break "stopped".to_string(),
            Wake::StreamEnded if !inner.policy.auto_reconnect => {
                tracing::warn!("stream ended; auto-reconnect disabled");
                break "stream ended".to_string();
            }
            Wake::StreamEnded => tracing::warn!("stream ended; reconnecting"),
            Wake::Periodic => tracing::info!("periodic reconnect"),
        }

        inner.set_state(ConnectionState::Reconnecting);
        match inner.reconnect().await {
            Ok(Some(new_link)) => {
                link = new_link;
                inner.set_state(ConnectionState::Connected);
                queue.push(Event::lifecycle(EventKind::Reconnect)).await;
            }
            Ok(None) => break "stopped".to_string(),
            Err(e) => {
                tracing::error!(error = %e, "reconnect failed permanently");
                break format!("reconnect failed: {e}");
            }
        }
    };

    inner.set_state(ConnectionState::Disconnected);
    inner.correlator.fail_all();
    queue
        .push(Event::with_reason(EventKind::Disconnect, reason))
        .await;
    dispatcher.shutdown().await;
    tracing::info!("realtime session ended");
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
