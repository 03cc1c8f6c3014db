//! Thread administration payloads.

use serde::Deserialize;

use crate::message::MessageMetadata;
use crate::normalize::{flat_string, flat_string_vec, lenient_i64, opt_flat_string, opt_lenient_i64};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddedParticipant {
    #[serde(rename = "fullName", default)]
    pub name: String,
    #[serde(rename = "userFbId", deserialize_with = "flat_string")]
    pub user_id: String,
    #[serde(rename = "lastUnsubscribeTimestampMs", default, deserialize_with = "opt_lenient_i64")]
    pub last_unsubscribed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticipantsAdded {
    #[serde(rename = "addedParticipants", default)]
    pub added: Vec<AddedParticipant>,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
    #[serde(default, deserialize_with = "flat_string_vec")]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticipantLeft {
    #[serde(rename = "leftParticipantFbId", deserialize_with = "flat_string")]
    pub user_id: String,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
    #[serde(default, deserialize_with = "flat_string_vec")]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminRemoved {
    #[serde(rename = "removedAdminFbIds", default, deserialize_with = "flat_string_vec")]
    pub user_ids: Vec<String>,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApprovalModeChange {
    #[serde(deserialize_with = "flat_string")]
    pub mode: String,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
}

impl ApprovalModeChange {
    pub fn enabled(&self) -> bool {
        self.mode == "1"
    }
}

fn join_through_link() -> String {
    "JOIN_THROUGH_LINK".into()
}

/// A join request entering or leaving the approval queue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApprovalQueue {
    #[serde(rename = "recipientFbId", deserialize_with = "flat_string")]
    pub requester_id: String,
    pub action: String,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
    #[serde(rename = "inviterFbId", default, deserialize_with = "opt_flat_string")]
    pub inviter_id: Option<String>,
    #[serde(rename = "requestTimestamp", default, deserialize_with = "opt_lenient_i64")]
    pub requested_at: Option<i64>,
    #[serde(rename = "requestSource", default = "join_through_link")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinableModeChange {
    #[serde(deserialize_with = "flat_string")]
    pub mode: String,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadRename {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
    #[serde(default, deserialize_with = "flat_string_vec")]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMuteSettings {
    #[serde(rename = "actorFbId", default, deserialize_with = "flat_string")]
    pub actor_id: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    #[serde(rename = "expireTime", deserialize_with = "lenient_i64")]
    pub expires_at: i64,
}

/// Archive/unarchive and similar per-thread actions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadAction {
    pub action: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadFolderMove {
    #[serde(rename = "user_id", default, deserialize_with = "flat_string")]
    pub user_id: String,
    pub folder: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadDelete {
    #[serde(rename = "actorFbId", default, deserialize_with = "flat_string")]
    pub actor_id: String,
    #[serde(rename = "threadKeys", default, deserialize_with = "flat_string_vec")]
    pub thread_ids: Vec<String>,
}

/// Server asks the client to refetch a thread (or one message in it).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForcedFetch {
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "type", default)]
    pub fetch_type: Option<String>,
}
