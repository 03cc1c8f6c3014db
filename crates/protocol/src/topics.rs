//! Topic names and the versioned subscription set.
//!
//! Adding or removing an entry in [`SUBSCRIBED_TOPICS`] changes what the
//! backend delivers to us, so bump [`TOPICS_VERSION`] alongside it.

/// Version of [`SUBSCRIBED_TOPICS`].
pub const TOPICS_VERSION: u32 = 1;

// ── Inbound ──────────────────────────────────────────────────────────

/// Main delta stream (messages, thread admin, receipts).
pub const DELTAS: &str = "/t_ms";
pub const THREAD_TYPING: &str = "/thread_typing";
pub const ORCA_TYPING: &str = "/orca_typing_notifications";
pub const PRESENCE: &str = "/orca_presence";
/// Generic notifications (pokes, friend requests).
pub const LEGACY_WEB: &str = "/legacy_web";
/// Request topic for the request/response convention.
pub const REQUESTS: &str = "/ls_req";
/// Response topic for the request/response convention.
pub const RESPONSES: &str = "/ls_resp";

// ── Outbound control ─────────────────────────────────────────────────

pub const CREATE_QUEUE: &str = "/messenger_sync_create_queue";
pub const GET_DIFFS: &str = "/messenger_sync_get_diffs";
pub const FOREGROUND_STATE: &str = "/foreground_state";
pub const CLIENT_SETTINGS: &str = "/set_client_settings";

/// Topics subscribed at connect time.
///
/// Several of these are forwarded by the backend but carry nothing we
/// decode today; they stay subscribed because the server expects them.
pub const SUBSCRIBED_TOPICS: &[&str] = &[
    LEGACY_WEB,
    "/webrtc",
    "/rtc_multi",
    "/onevc",
    "/br_sr",
    "/sr_res",
    DELTAS,
    THREAD_TYPING,
    ORCA_TYPING,
    "/notify_disconnect",
    PRESENCE,
    "/inbox",
    "/mercury",
    "/messaging_events",
    "/orca_message_notifications",
    "/pp",
    "/webrtc_response",
    REQUESTS,
    RESPONSES,
];

/// How the decoder treats frames on a given topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicClass {
    Deltas,
    Typing,
    Presence,
    Notification,
    Response,
    /// Subscribed, but nothing on it is decoded.
    Ignored,
    Unrecognized,
}

impl TopicClass {
    pub fn of(topic: &str) -> Self {
        match topic {
            DELTAS => Self::Deltas,
            THREAD_TYPING | ORCA_TYPING => Self::Typing,
            PRESENCE => Self::Presence,
            LEGACY_WEB => Self::Notification,
            RESPONSES => Self::Response,
            t if SUBSCRIBED_TOPICS.contains(&t) => Self::Ignored,
            _ => Self::Unrecognized,
        }
    }
}
