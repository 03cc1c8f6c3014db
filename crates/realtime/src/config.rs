use std::fmt;
use std::path::Path;
use std::time::Duration;

use ec_protocol::mqtt::DEFAULT_KEEP_ALIVE_SECS;
use serde::{Deserialize, Serialize};

use crate::types::RealtimeError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
}

impl RealtimeConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RealtimeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RealtimeError::Config(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RealtimeError> {
        toml::from_str(raw).map_err(|e| RealtimeError::Config(format!("parsing TOML: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_path")]
    pub path: String,
    /// `wss` when true, plain `ws` otherwise (local brokers in tests).
    #[serde(default = "d_true")]
    pub tls: bool,
    #[serde(default = "d_origin")]
    pub origin: String,
    /// Overrides the credentials' `app_id` on request envelopes when set.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Overrides the credentials' user agent when set.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "d_keep_alive")]
    pub keep_alive_secs: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            path: d_path(),
            tls: true,
            origin: d_origin(),
            app_id: None,
            user_agent: None,
            keep_alive_secs: d_keep_alive(),
        }
    }
}

impl EndpointConfig {
    /// Full websocket URL for one connection.
    pub fn url(&self, session_id: u64) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}{}?sid={session_id}", self.host, self.path)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Appear online (`chat_on` / `fg` in the connect username, and the
    /// presence publishes after bootstrap).
    #[serde(default = "d_true")]
    pub chat_on: bool,
    #[serde(default = "d_true")]
    pub foreground: bool,
    /// Bounded event queue between decode and dispatch.
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    /// Default timeout for correlated requests.
    #[serde(default = "d_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chat_on: true,
            foreground: true,
            queue_capacity: d_queue_capacity(),
            request_timeout_secs: d_request_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_heartbeat_interval")]
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: d_heartbeat_interval(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Rebuild the session after an unexpected stream end.
    #[serde(default = "d_true")]
    pub auto_reconnect: bool,
    /// Rebuild the session on a jittered timer even when healthy.
    #[serde(default = "d_true")]
    pub periodic: bool,
    #[serde(default = "d_min_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "d_max_interval")]
    pub max_interval_secs: u64,
    /// Pause between tearing down and rebuilding.
    #[serde(default = "d_settle_delay")]
    pub settle_delay_secs: u64,
    /// Bounds for the pause after a failed rebuild.
    #[serde(default = "d_retry_min")]
    pub retry_min_secs: u64,
    #[serde(default = "d_retry_max")]
    pub retry_max_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            periodic: true,
            min_interval_secs: d_min_interval(),
            max_interval_secs: d_max_interval(),
            settle_delay_secs: d_settle_delay(),
            retry_min_secs: d_retry_min(),
            retry_max_secs: d_retry_max(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Baseline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default = "d_graphql_url")]
    pub graphql_url: String,
    /// Persisted query id for the inbox/sequence-id lookup.
    #[serde(default = "d_doc_id")]
    pub doc_id: String,
    #[serde(default = "d_baseline_timeout")]
    pub timeout_secs: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            graphql_url: d_graphql_url(),
            doc_id: d_doc_id(),
            timeout_secs: d_baseline_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_host() -> String {
    "edge-chat.facebook.com".into()
}
fn d_path() -> String {
    "/chat".into()
}
fn d_origin() -> String {
    "https://www.facebook.com".into()
}
fn d_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE_SECS
}
fn d_queue_capacity() -> usize {
    1000
}
fn d_request_timeout() -> u64 {
    10
}
fn d_heartbeat_interval() -> u64 {
    50
}
fn d_min_interval() -> u64 {
    20 * 60
}
fn d_max_interval() -> u64 {
    60 * 60
}
fn d_settle_delay() -> u64 {
    1
}
fn d_retry_min() -> u64 {
    5
}
fn d_retry_max() -> u64 {
    30
}
fn d_graphql_url() -> String {
    "https://www.facebook.com/api/graphqlbatch/".into()
}
fn d_doc_id() -> String {
    "1349387578499440".into()
}
fn d_baseline_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl RealtimeConfig {
    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.endpoint.host.is_empty() {
            error("endpoint.host", "host must not be empty");
        }
        if self.session.queue_capacity == 0 {
            error("session.queue_capacity", "capacity must be greater than 0");
        }
        if self.session.request_timeout_secs == 0 {
            error("session.request_timeout_secs", "timeout must be greater than 0");
        }
        if self.heartbeat.enabled && self.heartbeat.interval_secs == 0 {
            error("heartbeat.interval_secs", "interval must be greater than 0");
        }
        if self.reconnect.min_interval_secs > self.reconnect.max_interval_secs {
            error(
                "reconnect.min_interval_secs",
                "min_interval_secs must not exceed max_interval_secs",
            );
        }
        if self.reconnect.retry_min_secs > self.reconnect.retry_max_secs {
            error(
                "reconnect.retry_min_secs",
                "retry_min_secs must not exceed retry_max_secs",
            );
        }
        if self.reconnect.periodic && self.reconnect.max_interval_secs == 0 {
            error(
                "reconnect.max_interval_secs",
                "periodic reconnect needs a non-zero interval",
            );
        }

        if !self.reconnect.auto_reconnect {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.auto_reconnect".into(),
                message: "session will end on the first network loss".into(),
            });
        }

        errors
    }
}
