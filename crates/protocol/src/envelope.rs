//! Request/response envelopes for the `/ls_req` → `/ls_resp` convention.

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// App id stamped on every request envelope.
pub const DEFAULT_APP_ID: &str = "2220391788200892";

/// `type` discriminant for task batches.
pub const TASK_REQUEST_TYPE: u32 = 3;

/// `version_id` sent with task batches.
pub const DEFAULT_VERSION_ID: &str = "7214102258676893";

/// Outbound request. `payload` is itself a JSON document, encoded to a
/// string, as the server expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub app_id: String,
    pub payload: String,
    pub request_id: u64,
    #[serde(rename = "type")]
    pub kind: u32,
}

impl RequestEnvelope {
    /// Wrap an inner payload, serializing it to the nested JSON string.
    pub fn new<T: Serialize>(
        app_id: impl Into<String>,
        request_id: u64,
        kind: u32,
        inner: &T,
    ) -> Result<Self, WireError> {
        Ok(Self {
            app_id: app_id.into(),
            payload: serde_json::to_string(inner)?,
            request_id,
            kind,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Inbound reply on the response topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: u64,
    /// Opaque until the caller decodes it.
    #[serde(default)]
    pub payload: String,
}

impl ResponseEnvelope {
    /// Decode only the envelope; the inner payload stays a string.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the inner payload into a concrete type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

// ── Task batches ─────────────────────────────────────────────────────

/// One queued operation inside a [`TaskBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub failure_count: Option<u32>,
    pub label: String,
    /// JSON-encoded task arguments.
    pub payload: String,
    pub queue_name: String,
    pub task_id: u64,
}

impl Task {
    pub fn new<T: Serialize>(
        task_id: u64,
        label: impl Into<String>,
        queue_name: impl Into<String>,
        args: &T,
    ) -> Result<Self, WireError> {
        Ok(Self {
            failure_count: None,
            label: label.into(),
            payload: serde_json::to_string(args)?,
            queue_name: queue_name.into(),
            task_id,
        })
    }
}

/// Inner payload of a `type = 3` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBatch {
    pub epoch_id: u64,
    pub tasks: Vec<Task>,
    pub version_id: String,
}

impl TaskBatch {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            epoch_id: epoch_id(chrono::Utc::now().timestamp_millis()),
            tasks,
            version_id: DEFAULT_VERSION_ID.into(),
        }
    }
}

/// Offline-threading style id: milliseconds shifted into the high bits.
pub fn epoch_id(now_ms: i64) -> u64 {
    (now_ms.max(0) as u64) << 22
}
