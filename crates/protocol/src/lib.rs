//! Wire protocol for the edge-chat realtime endpoint.
//!
//! The endpoint speaks MQTT 3.1 framed inside websocket binary messages.
//! On top of plain pub/sub it layers two conventions this crate models:
//!
//! - **Queue bootstrap**: exactly one control message right after connect
//!   (`/messenger_sync_create_queue` or `/messenger_sync_get_diffs`).
//! - **Request/response**: [`RequestEnvelope`] published on `/ls_req`,
//!   answered by a [`ResponseEnvelope`] on `/ls_resp` carrying the same
//!   `request_id`.
//!
//! Nothing here performs I/O; the realtime crate owns sockets and tasks.

pub mod control;
pub mod envelope;
pub mod error;
pub mod mqtt;
pub mod topics;

pub use control::{ClientSettings, ConnectUsername, ForegroundState, QueueBootstrap};
pub use envelope::{RequestEnvelope, ResponseEnvelope, Task, TaskBatch};
pub use error::WireError;
pub use mqtt::{MqttCodec, Packet, QoS};
pub use topics::{TopicClass, SUBSCRIBED_TOPICS, TOPICS_VERSION};
