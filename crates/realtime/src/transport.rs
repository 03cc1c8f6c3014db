//! Transport seam: a [`Connector`] produces one [`Link`] per physical
//! connection. The session only sees ordered inbound frames and a
//! publisher handle.

use bytes::Bytes;
use ec_protocol::QoS;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{RealtimeError, SessionCredentials};

/// One inbound PUBLISH, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// One outbound PUBLISH queued for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
}

/// Cloneable handle for publishing on the current link.
#[derive(Debug, Clone)]
pub struct LinkPublisher {
    tx: mpsc::Sender<Outbound>,
}

impl LinkPublisher {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
    ) -> Result<(), RealtimeError> {
        let msg = Outbound {
            topic: topic.to_string(),
            payload: payload.into(),
            qos,
        };
        self.tx
            .send(msg)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live connection. Dropping it closes the connection.
///
/// The frame stream ends when the connection is lost.
#[derive(Debug)]
pub struct Link {
    pub publisher: LinkPublisher,
    pub frames: mpsc::Receiver<Frame>,
    pub close: CancellationToken,
}

impl Link {
    pub fn close(&self) {
        self.close.cancel();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.close.cancel();
    }
}

/// Options that vary per connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub chat_on: bool,
    pub foreground: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            chat_on: true,
            foreground: true,
        }
    }
}

/// Opens physical connections.
///
/// Implementations must have subscribed to the full topic set before
/// returning. Queue bootstrap is the session's job, not the connector's.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        credentials: &SessionCredentials,
        options: &ConnectOptions,
    ) -> Result<Link, RealtimeError>;
}
