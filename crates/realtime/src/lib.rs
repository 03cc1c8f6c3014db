//! `ec-realtime`: a long-lived realtime session against the edge-chat
//! MQTT-over-websocket endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌──────────────┐  events  ┌────────────┐
//! │  Connector   │──────────▶│ receive loop │─────────▶│ Dispatcher │──▶ listeners
//! │ (ws + MQTT)  │◀──────────│  (session)   │          └────────────┘
//! └──────────────┘  publish  └──────┬───────┘
//!                                   │ /ls_resp        /t_ms
//!                          RequestCorrelator     CursorTracker
//! ```
//!
//! # Session flow
//!
//! 1. Fetch the inbox sequence id over HTTP and seed the cursor
//! 2. Connect the websocket, send MQTT CONNECT, wait for CONNACK, subscribe
//! 3. Publish exactly one queue bootstrap (create-queue or get-diffs)
//! 4. Publish presence when `chat_on`, then every heartbeat interval
//! 5. Decode inbound frames into events and dispatch them in order
//! 6. On stream end (or the periodic timer): tear down, settle, regenerate
//!    the device id, re-fetch the sequence id, and rebuild from step 2
//!
//! # Example
//!
//! ```rust,no_run
//! use ec_realtime::{listener_fn, EventKind, RealtimeClient, SessionCredentials};
//!
//! # async fn run() -> Result<(), ec_realtime::RealtimeError> {
//! let client = RealtimeClient::builder()
//!     .credentials(SessionCredentials::new("100012345", "c_user=100012345; xs=..."))
//!     .build()?;
//! client.listeners().register(
//!     EventKind::Message,
//!     listener_fn(|event| {
//!         if let Some(msg) = event.message() {
//!             println!("{}: {}", msg.sender_id, msg.text);
//!         }
//!         Ok(())
//!     }),
//! );
//! client.start().await?;
//! client.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod builder;
pub mod client;
pub mod config;
pub mod correlator;
pub mod cursor;
pub mod dispatcher;
pub mod heartbeat;
pub mod reconnect;
pub mod registry;
pub mod transport;
pub mod types;
pub mod ws;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use baseline::{FixedSequence, GraphqlSequenceSource, SequenceSource};
pub use builder::RealtimeClientBuilder;
pub use client::RealtimeClient;
pub use config::{ConfigError, ConfigSeverity, RealtimeConfig};
pub use correlator::RequestCorrelator;
pub use cursor::{Cursor, CursorTracker};
pub use dispatcher::{Dispatcher, EventQueue};
pub use reconnect::ReconnectPolicy;
pub use registry::{listener_fn, EventListener, ListenerId, ListenerRegistry, LoggingListener};
pub use transport::{ConnectOptions, Connector, Frame, Link, LinkPublisher, Outbound};
pub use types::{ConnectionState, RealtimeError, SessionCredentials};
pub use ws::WsMqttConnector;

// Decoded events and the wire types callers need for `request`/`send_tasks`.
pub use ec_deltas::{Event, EventArg, EventKind, Message, MessageMetadata};
pub use ec_protocol::{QoS, ResponseEnvelope, Task};
