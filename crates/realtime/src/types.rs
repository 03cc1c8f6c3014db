//! Core types shared across the session: credentials, connection state,
//! and the crate error.

use std::fmt;

use ec_deltas::ParsingError;
use ec_protocol::envelope::DEFAULT_APP_ID;
use ec_protocol::WireError;

/// Default browser user agent presented on the websocket upgrade and the
/// baseline fetch.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Identity material for one logged-in account.
///
/// Obtained from the authenticated HTTP layer; the session only reads it,
/// except for the device id which is regenerated on every reconnect.
#[derive(Clone)]
pub struct SessionCredentials {
    pub user_id: String,
    /// Per-connection device identifier (`d` in the connect username).
    pub device_id: String,
    /// Stamped on request envelopes.
    pub app_id: String,
    /// Raw `Cookie` header value.
    pub cookie: String,
    pub user_agent: String,
    /// Extra form fields for HTTP calls (`fb_dtsg`, `jazoest`, `__user`, ...).
    pub form_fields: Vec<(String, String)>,
}

impl SessionCredentials {
    pub fn new(user_id: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: uuid::Uuid::new_v4().to_string(),
            app_id: DEFAULT_APP_ID.into(),
            cookie: cookie.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            form_fields: Vec::new(),
        }
    }

    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_fields.push((key.into(), value.into()));
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Replace the device id with a fresh one.
    pub fn regenerate_device_id(&mut self) {
        self.device_id = uuid::Uuid::new_v4().to_string();
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("app_id", &self.app_id)
            .field("cookie", &"<redacted>")
            .field("form_fields", &self.form_fields.len())
            .finish()
    }
}

/// Supervisor state.
///
/// `Disconnected → Connecting → Connected → Reconnecting → Connected | Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        })
    }
}

/// Top-level session error.
#[derive(thiserror::Error, Debug)]
pub enum RealtimeError {
    #[error("config: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("baseline: {0}")]
    Baseline(String),
    #[error("request {request_id} timed out")]
    Timeout { request_id: u64 },
    #[error(transparent)]
    Parsing(#[from] ParsingError),
    #[error("wire: {0}")]
    Wire(#[from] WireError),
    #[error("not connected")]
    NotConnected,
    #[error("shutdown")]
    Shutdown,
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RealtimeError {
    /// Whether the supervisor should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Baseline(_) | Self::NotConnected | Self::Wire(_)
        )
    }
}
