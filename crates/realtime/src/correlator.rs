//! Request/response correlation over the one-way pub/sub channel.
//!
//! A caller publishes a [`RequestEnvelope`](ec_protocol::RequestEnvelope)
//! on `/ls_req` and parks on a oneshot keyed by its `request_id`. The
//! receive loop resolves the oneshot when a response with the same id
//! arrives on `/ls_resp`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ec_protocol::{topics, QoS, ResponseEnvelope};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::transport::LinkPublisher;
use crate::types::RealtimeError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RequestCorrelator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RequestCorrelator {
    next_request: AtomicU64,
    next_task: AtomicU64,
    /// Map of request_id → waiting caller.
    pending: Mutex<HashMap<u64, oneshot::Sender<ResponseEnvelope>>>,
    default_timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            next_request: AtomicU64::new(0),
            next_task: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            default_timeout,
        }
    }

    /// Next request id. Never reused within the lifetime of this correlator.
    pub fn next_request_id(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }

    /// Next task id for task batches; a separate sequence from request ids.
    pub fn next_task_id(&self) -> u64 {
        self.next_task.fetch_add(1, Ordering::Relaxed)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Publish `payload` (which must embed `request_id`) and wait for the
    /// matching response.
    ///
    /// A timeout removes the waiter; it does not cancel the server-side
    /// operation. A late reply is then discarded by [`resolve`](Self::resolve).
    pub async fn send(
        &self,
        publisher: &LinkPublisher,
        request_id: u64,
        payload: impl Into<Bytes>,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, RealtimeError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&request_id) {
                return Err(RealtimeError::Other(anyhow::anyhow!(
                    "request {request_id} is already pending"
                )));
            }
            pending.insert(request_id, tx);
        }

        if let Err(e) = publisher
            .publish(topics::REQUESTS, payload, QoS::AtLeastOnce)
            .await
        {
            self.pending.lock().remove(&request_id);
            return Err(e);
        }

        let timeout = timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: the session failed all waiters.
            Ok(Err(_)) => Err(RealtimeError::Shutdown),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::warn!(
                    request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(RealtimeError::Timeout { request_id })
            }
        }
    }

    /// Hand a response to its waiter. Returns false when nobody is waiting
    /// (late, duplicate, or foreign reply); the response is discarded.
    pub fn resolve(&self, response: ResponseEnvelope) -> bool {
        let request_id = response.request_id;
        let Some(tx) = self.pending.lock().remove(&request_id) else {
            tracing::debug!(request_id, "response for unknown request, discarding");
            return false;
        };
        // The caller may have been dropped between lookup and send.
        tx.send(response).is_ok()
    }

    /// Fail every outstanding waiter immediately. Returns how many there were.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        if count > 0 {
            tracing::info!(count, "failing pending requests");
        }
        // Dropping the senders wakes every receiver with an error.
        drop(drained);
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.lock().contains_key(&request_id)
    }
}
