//! Legacy web notifications: pokes and friend-request updates.

use serde::Deserialize;

use crate::normalize::{flat_string, lenient_i64, opt_lenient_i64};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Poke {
    #[serde(rename = "poke_source", deserialize_with = "flat_string")]
    pub user_id: String,
    #[serde(rename = "poke_time", default, deserialize_with = "opt_lenient_i64")]
    pub poked_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendRequestState {
    #[serde(rename = "userid", deserialize_with = "flat_string")]
    pub user_id: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendRequestCounts {
    #[serde(rename = "num_unread", default, deserialize_with = "lenient_i64")]
    pub unread: i64,
    #[serde(rename = "num_unseen", default, deserialize_with = "lenient_i64")]
    pub unseen: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendRequestRemoved {
    #[serde(rename = "from", deserialize_with = "flat_string")]
    pub user_id: String,
}

/// Tagged on `"type"`. Tags with no semantic event are kept as unit
/// variants so they are recognized rather than reported as unknown.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireNotification {
    #[serde(rename = "live_poke")]
    Poke(Poke),
    #[serde(rename = "friending_state_change")]
    FriendRequestState(FriendRequestState),
    #[serde(rename = "mobile_requests_count")]
    FriendRequestCounts(FriendRequestCounts),
    #[serde(rename = "jewel_requests_remove_old")]
    FriendRequestRemoved(FriendRequestRemoved),
    #[serde(
        rename = "friend_requests_seen",
        alias = "notifications_seen",
        alias = "nav_update_counts",
        alias = "jewel_friending_notifs"
    )]
    Ignored,
    #[serde(other)]
    Unknown,
}
