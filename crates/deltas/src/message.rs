//! Messages, attachments, reactions and the other message-family payloads.

use serde::Deserialize;
use serde_json::Value;

use crate::normalize::{
    decode_nested, flat_string, flat_string_vec, lenient_i64, opt_flat_string, opt_lenient_i64,
    opt_nested,
};

/// Metadata block shared by messages and most thread-admin deltas.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageMetadata {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "actorFbId", deserialize_with = "flat_string")]
    pub actor_id: String,
    #[serde(rename = "folderId", default, deserialize_with = "opt_flat_string")]
    pub folder: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub timestamp: i64,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    #[serde(rename = "adminText", default)]
    pub admin_text: String,
    #[serde(rename = "unsendType", default = "unknown_unsend_type")]
    pub unsend_type: String,
}

fn unknown_unsend_type() -> String {
    "unknown".into()
}

impl MessageMetadata {
    pub fn can_unsend(&self) -> bool {
        self.unsend_type.eq_ignore_ascii_case("can_unsend")
    }
}

/// A user mention inside a message body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Mention {
    #[serde(rename = "i", deserialize_with = "flat_string")]
    pub user_id: String,
    #[serde(rename = "o", deserialize_with = "lenient_i64")]
    pub offset: i64,
    #[serde(rename = "l", deserialize_with = "lenient_i64")]
    pub length: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Image,
    AnimatedImage,
    Video,
    Audio,
    File,
    Location,
    Sticker,
    Share,
    Unknown,
}

impl AttachmentKind {
    fn from_mercury(mercury: &Value) -> Self {
        if !mercury["sticker_attachment"].is_null() {
            return Self::Sticker;
        }
        if let Some(typename) = mercury["blob_attachment"]["__typename"].as_str() {
            return match typename {
                "MessageImage" => Self::Image,
                "MessageAnimatedImage" => Self::AnimatedImage,
                "MessageVideo" => Self::Video,
                "MessageAudio" => Self::Audio,
                "MessageFile" => Self::File,
                "MessageLocation" => Self::Location,
                _ => Self::Unknown,
            };
        }
        if !mercury["extensible_attachment"].is_null() {
            return Self::Share;
        }
        Self::Unknown
    }
}

/// One attachment; `mercury` keeps the raw descriptor for callers that
/// need fields beyond the classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: Option<String>,
    pub kind: AttachmentKind,
    pub mercury: Value,
}

/// A decoded chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub thread_id: String,
    pub timestamp: i64,
    pub mentions: Vec<Mention>,
    pub attachments: Vec<Attachment>,
    pub participants: Vec<String>,
    pub can_unsend: bool,
    pub replied_to: Option<Box<Message>>,
    pub metadata: MessageMetadata,
}

impl Message {
    pub(crate) fn from_wire(wire: WireMessage, replied_to: Option<Message>) -> Self {
        let metadata = wire.metadata;
        Self {
            id: metadata.message_id.clone(),
            text: wire.body.unwrap_or_default(),
            sender_id: metadata.actor_id.clone(),
            thread_id: metadata.thread_id.clone(),
            timestamp: metadata.timestamp,
            mentions: wire.mentions,
            attachments: wire
                .attachments
                .into_iter()
                .map(WireAttachment::into_attachment)
                .collect(),
            participants: wire.participants,
            can_unsend: metadata.can_unsend(),
            replied_to: replied_to.map(Box::new),
            metadata,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.replied_to.is_some()
    }
}

// ── Wire shapes ──────────────────────────────────────────────────────

/// Message body as carried by `NewMessage` and by reply payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(rename = "messageMetadata")]
    metadata: MessageMetadata,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
    #[serde(rename = "data", default, deserialize_with = "mentions_from_data")]
    mentions: Vec<Mention>,
    #[serde(rename = "participants", default, deserialize_with = "flat_string_vec")]
    participants: Vec<String>,
}

/// Top-level deltas carry `mercury` as an object; reply payloads carry
/// `mercuryJSON` as an encoded string.
#[derive(Debug, Deserialize)]
struct WireAttachment {
    #[serde(default, deserialize_with = "opt_flat_string")]
    id: Option<String>,
    #[serde(default)]
    mercury: Option<Value>,
    #[serde(rename = "mercuryJSON", default, deserialize_with = "opt_nested")]
    mercury_json: Option<Value>,
}

impl WireAttachment {
    fn into_attachment(self) -> Attachment {
        let mercury = self.mercury.or(self.mercury_json).unwrap_or(Value::Null);
        Attachment {
            id: self.id,
            kind: AttachmentKind::from_mercury(&mercury),
            mercury,
        }
    }
}

fn mentions_from_data<'de, D>(d: D) -> Result<Vec<Mention>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    let data = Value::deserialize(d)?;
    match data.get("prng") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(prng) => decode_nested(prng.clone()).map_err(D::Error::custom),
    }
}

/// Body of `deltaMessageReply` inside a client payload.
#[derive(Debug, Deserialize)]
pub(crate) struct WireReply {
    #[serde(rename = "repliedToMessage", default)]
    pub replied_to: Option<WireMessage>,
    #[serde(default)]
    pub message: Option<WireMessage>,
    #[serde(rename = "replyType", default, deserialize_with = "opt_lenient_i64")]
    pub reply_type: Option<i64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client-payload members
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum ReactionAction {
    Added,
    Removed,
}

impl TryFrom<i64> for ReactionAction {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Added),
            1 => Ok(Self::Removed),
            other => Err(format!("unknown reaction action {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageReaction {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    /// Who reacted.
    #[serde(rename = "userId", deserialize_with = "flat_string")]
    pub reactor_id: String,
    /// Author of the reacted-to message.
    #[serde(rename = "senderId", default, deserialize_with = "flat_string")]
    pub message_sender_id: String,
    pub action: ReactionAction,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(rename = "reactionTimestamp", default, deserialize_with = "opt_lenient_i64")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageUnsend {
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    #[serde(rename = "senderID", deserialize_with = "flat_string")]
    pub sender_id: String,
    #[serde(rename = "deletionTimestamp", deserialize_with = "lenient_i64")]
    pub deleted_at: i64,
}

/// Messages removed for the viewer only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRemove {
    #[serde(rename = "messageIds", default, deserialize_with = "flat_string_vec")]
    pub message_ids: Vec<String>,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMute {
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    /// `-1` means muted indefinitely, `0` unmuted.
    #[serde(rename = "muteUntil", deserialize_with = "lenient_i64")]
    pub mute_until: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewerStatus {
    #[serde(rename = "actorFbid", default, deserialize_with = "flat_string")]
    pub actor_id: String,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    #[serde(rename = "canViewerReply", default)]
    pub can_reply: bool,
    #[serde(default, deserialize_with = "opt_lenient_i64")]
    pub reason: Option<i64>,
    #[serde(rename = "isMsgBlockedByViewer", default)]
    pub messages_blocked: Option<bool>,
    #[serde(rename = "isMsgBlockedTimestamp", default, deserialize_with = "opt_lenient_i64")]
    pub messages_blocked_at: Option<i64>,
    #[serde(rename = "isFBBlockedByViewer", default)]
    pub profile_blocked: Option<bool>,
    #[serde(rename = "isFBBlockedTimestamp", default, deserialize_with = "opt_lenient_i64")]
    pub profile_blocked_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageNotification {
    #[serde(rename = "senderId", default, deserialize_with = "flat_string")]
    pub sender_id: String,
    #[serde(rename = "pageId", default, deserialize_with = "flat_string")]
    pub page_id: String,
    #[serde(rename = "pageName", default)]
    pub page_name: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "senderProfPicUrl", default)]
    pub sender_picture_url: Option<String>,
    #[serde(rename = "pageProfPicUrl", default)]
    pub page_picture_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata() -> Value {
        json!({
            "messageId": "mid.1",
            "actorFbId": 42,
            "timestamp": "1700000000000",
            "threadKey": { "threadFbId": "123" }
        })
    }

    #[test]
    fn metadata_defaults() {
        let m: MessageMetadata = serde_json::from_value(metadata()).unwrap();
        assert_eq!(m.actor_id, "42");
        assert_eq!(m.thread_id, "123");
        assert_eq!(m.timestamp, 1_700_000_000_000);
        assert_eq!(m.admin_text, "");
        assert_eq!(m.unsend_type, "unknown");
        assert!(!m.can_unsend());
    }

    #[test]
    fn message_with_mentions_and_attachments() {
        let wire: WireMessage = serde_json::from_value(json!({
            "messageMetadata": metadata(),
            "body": "@Bob hi",
            "data": { "prng": "[{\"i\":\"7\",\"o\":0,\"l\":4}]" },
            "attachments": [
                { "id": "a1", "mercury": { "blob_attachment": { "__typename": "MessageImage" } } },
                { "mercuryJSON": "{\"sticker_attachment\":{\"id\":\"s\"}}" }
            ],
            "participants": [1, 2]
        }))
        .unwrap();
        let msg = Message::from_wire(wire, None);
        assert_eq!(msg.text, "@Bob hi");
        assert_eq!(msg.mentions[0].user_id, "7");
        assert_eq!(msg.mentions[0].length, 4);
        assert_eq!(msg.attachments[0].kind, AttachmentKind::Image);
        assert_eq!(msg.attachments[1].kind, AttachmentKind::Sticker);
        assert_eq!(msg.participants, vec!["1", "2"]);
        assert!(!msg.is_reply());
    }

    #[test]
    fn reaction_action_codes() {
        let base = json!({
            "messageId": "m", "threadKey": { "otherUserFbId": 9 },
            "userId": 1, "senderId": 2, "reaction": "👍"
        });
        let mut added = base.clone();
        added["action"] = json!(0);
        let r: MessageReaction = serde_json::from_value(added).unwrap();
        assert_eq!(r.action, ReactionAction::Added);
        assert_eq!(r.thread_id, "9");

        let mut bad = base;
        bad["action"] = json!(5);
        assert!(serde_json::from_value::<MessageReaction>(bad).is_err());
    }
}
