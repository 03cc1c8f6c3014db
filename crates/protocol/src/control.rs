//! Control messages: queue bootstrap, presence/settings publishes, and the
//! JSON blob carried in the MQTT CONNECT username field.

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::topics;

pub const SYNC_API_VERSION: u32 = 10;
pub const MAX_DELTAS_ABLE_TO_PROCESS: u32 = 1000;
pub const DELTA_BATCH_SIZE: u32 = 500;
pub const DELTA_ENCODING: &str = "JSON";

/// Application id sent in the connect username (`aid`).
pub const MQTT_APP_ID: u64 = 219_994_525_426_954;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue bootstrap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The mandatory first publish after every successful connect.
///
/// Which variant is sent depends on the cursor: no sync token means the
/// server has to build a fresh delivery queue from `sequence_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueBootstrap {
    GetDiffs {
        sync_api_version: u32,
        max_deltas_able_to_process: u32,
        delta_batch_size: u32,
        encoding: String,
        entity_fbid: String,
        last_seq_id: String,
        sync_token: String,
    },
    CreateQueue {
        sync_api_version: u32,
        max_deltas_able_to_process: u32,
        delta_batch_size: u32,
        encoding: String,
        entity_fbid: String,
        initial_titan_sequence_id: String,
        device_params: Option<serde_json::Value>,
    },
}

impl QueueBootstrap {
    /// Pick the bootstrap shape for the given cursor state.
    pub fn for_cursor(user_id: &str, sequence_id: i64, sync_token: Option<&str>) -> Self {
        match sync_token {
            Some(token) => Self::GetDiffs {
                sync_api_version: SYNC_API_VERSION,
                max_deltas_able_to_process: MAX_DELTAS_ABLE_TO_PROCESS,
                delta_batch_size: DELTA_BATCH_SIZE,
                encoding: DELTA_ENCODING.into(),
                entity_fbid: user_id.into(),
                last_seq_id: sequence_id.to_string(),
                sync_token: token.into(),
            },
            None => Self::CreateQueue {
                sync_api_version: SYNC_API_VERSION,
                max_deltas_able_to_process: MAX_DELTAS_ABLE_TO_PROCESS,
                delta_batch_size: DELTA_BATCH_SIZE,
                encoding: DELTA_ENCODING.into(),
                entity_fbid: user_id.into(),
                initial_titan_sequence_id: sequence_id.to_string(),
                device_params: None,
            },
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            Self::GetDiffs { .. } => topics::GET_DIFFS,
            Self::CreateQueue { .. } => topics::CREATE_QUEUE,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Presence / settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Published on `/foreground_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundState {
    pub foreground: bool,
}

/// Published on `/set_client_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub make_user_available_when_in_foreground: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connect username
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON document the endpoint expects in the CONNECT username field.
///
/// Field names are the server's; most of them are fixed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectUsername {
    /// User id.
    pub u: String,
    /// Session id (same value as the `sid` query parameter).
    pub s: u64,
    pub chat_on: bool,
    pub fg: bool,
    /// Device id.
    pub d: String,
    pub aid: u64,
    /// Subscribed topics.
    pub st: Vec<String>,
    pub pm: Vec<serde_json::Value>,
    pub cp: u32,
    pub ecp: u32,
    pub ct: String,
    pub mqtt_sid: String,
    pub dc: String,
    pub no_auto_fg: bool,
    pub gas: Option<serde_json::Value>,
    pub pack: Vec<serde_json::Value>,
    pub p: Option<serde_json::Value>,
    pub aids: Option<serde_json::Value>,
    pub php_override: String,
}

impl ConnectUsername {
    pub fn new(user_id: &str, session_id: u64, device_id: &str, online: bool, topics: &[&str]) -> Self {
        Self {
            u: user_id.into(),
            s: session_id,
            chat_on: online,
            fg: online,
            d: device_id.into(),
            aid: MQTT_APP_ID,
            st: topics.iter().map(|t| t.to_string()).collect(),
            pm: Vec::new(),
            cp: 3,
            ecp: 10,
            ct: "websocket".into(),
            mqtt_sid: String::new(),
            dc: String::new(),
            no_auto_fg: true,
            gas: None,
            pack: Vec::new(),
            p: None,
            aids: None,
            php_override: String::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}
