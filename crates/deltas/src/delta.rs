//! The wire-level delta union and its semantic counterpart.

use serde::Deserialize;
use serde_json::Value;

use crate::admin_text::AdminText;
use crate::event::{Event, EventArg};
use crate::kind::EventKind;
use crate::message::{
    Message, MessageMetadata, MessageReaction, MessageRemove, MessageUnsend, PageNotification,
    ThreadMute, ViewerStatus, WireMessage, WireReply,
};
use crate::normalize::nested;
use crate::notification::{FriendRequestCounts, FriendRequestRemoved, FriendRequestState, Poke};
use crate::presence::{Presence, Typing};
use crate::receipt::{DeliveryReceipt, FolderSeen, MarkRead, MarkUnread, ReadReceipt};
use crate::thread::{
    AdminRemoved, ApprovalModeChange, ApprovalQueue, ForcedFetch, JoinableModeChange,
    ParticipantLeft, ParticipantsAdded, ThreadAction, ThreadDelete, ThreadFolderMove,
    ThreadMuteSettings, ThreadRename,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire union
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry of a `/t_ms` delta batch, discriminated by `"class"`.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
pub(crate) enum RawDelta {
    NewMessage(WireMessage),
    ClientPayload(WireClientPayload),
    NoOp,

    ReadReceipt(ReadReceipt),
    DeliveryReceipt(DeliveryReceipt),
    MarkFolderSeen(FolderSeen),
    MarkRead(MarkRead),
    MarkUnread(MarkUnread),

    ApprovalMode(ApprovalModeChange),
    ApprovalQueue(ApprovalQueue),
    JoinableMode(JoinableModeChange),
    ParticipantsAddedToGroupThread(ParticipantsAdded),
    ParticipantLeftGroupThread(ParticipantLeft),
    AdminRemovedFromGroupThread(AdminRemoved),
    ThreadName(ThreadRename),
    ThreadMuteSettings(ThreadMuteSettings),
    ThreadAction(ThreadAction),
    ThreadFolder(ThreadFolderMove),
    ThreadDelete(ThreadDelete),
    ForcedFetch(ForcedFetch),
    AdminTextMessage(WireAdminText),

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAdminText {
    #[serde(rename = "messageMetadata")]
    pub metadata: MessageMetadata,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "untypedData", default)]
    pub untyped: Value,
}

/// `ClientPayload.payload` is a byte array holding `{"deltas": [...]}`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireClientPayload {
    #[serde(deserialize_with = "nested")]
    pub payload: ClientPayloadBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientPayloadBody {
    #[serde(default)]
    pub deltas: Vec<ClientDelta>,
}

/// Each inner entry carries exactly one populated member.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientDelta {
    #[serde(rename = "deltaMessageReply", default)]
    pub reply: Option<WireReply>,
    #[serde(rename = "replyType", default)]
    pub reply_type: Option<i64>,
    #[serde(rename = "deltaMessageReaction", default)]
    pub reaction: Option<MessageReaction>,
    #[serde(rename = "deltaRecallMessageData", default)]
    pub unsend: Option<MessageUnsend>,
    #[serde(rename = "deltaRemoveMessage", default)]
    pub remove: Option<MessageRemove>,
    #[serde(rename = "deltaMuteCallsFromThread", default)]
    pub mute: Option<ThreadMute>,
    #[serde(rename = "deltaChangeViewerStatus", default)]
    pub viewer_status: Option<ViewerStatus>,
    #[serde(rename = "deltaBiiMPageMessageNotification", default)]
    pub page_notification: Option<PageNotification>,
}

/// `replyType == 1` marks a bump of an older message rather than a reply.
const BUMP_REPLY_TYPE: i64 = 1;

impl ClientDelta {
    pub(crate) fn into_delta(self) -> Option<Delta> {
        if let Some(reply) = self.reply {
            let bump = self.reply_type.or(reply.reply_type) == Some(BUMP_REPLY_TYPE);
            let replied_to = reply.replied_to.map(|m| Message::from_wire(m, None));
            let message = Message::from_wire(reply.message?, replied_to);
            return Some(if bump {
                Delta::MessageBump(message)
            } else {
                Delta::Message(message)
            });
        }
        if let Some(r) = self.reaction {
            return Some(Delta::Reaction(r));
        }
        if let Some(u) = self.unsend {
            return Some(Delta::Unsend(u));
        }
        if let Some(r) = self.remove {
            return Some(Delta::Remove(r));
        }
        if let Some(m) = self.mute {
            return Some(Delta::ThreadMute(m));
        }
        if let Some(v) = self.viewer_status {
            return Some(Delta::ViewerStatus(v));
        }
        self.page_notification.map(Delta::PageNotification)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Semantic deltas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Admin text after its second pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminTextDelta {
    pub kind: EventKind,
    pub payload: AdminText,
    pub metadata: MessageMetadata,
}

/// A decoded realtime update. Every variant maps to exactly one
/// [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    // Messages
    Message(Message),
    MessageBump(Message),
    Reaction(MessageReaction),
    Unsend(MessageUnsend),
    Remove(MessageRemove),

    // Receipts
    ReadReceipt(ReadReceipt),
    DeliveryReceipt(DeliveryReceipt),
    MarkRead(MarkRead),
    MarkUnread(MarkUnread),
    FolderSeen(FolderSeen),

    // Thread admin
    AdminRemoved(AdminRemoved),
    ApprovalMode(ApprovalModeChange),
    ApprovalQueue(ApprovalQueue),
    JoinableMode(JoinableModeChange),
    ParticipantsAdded(ParticipantsAdded),
    ParticipantLeft(ParticipantLeft),
    ThreadName(ThreadRename),
    ThreadMuteSettings(ThreadMuteSettings),
    ThreadMute(ThreadMute),
    ThreadAction(ThreadAction),
    ThreadFolderMove(ThreadFolderMove),
    ThreadDelete(ThreadDelete),
    ForcedFetch(ForcedFetch),
    ViewerStatus(ViewerStatus),
    AdminText(AdminTextDelta),

    // Presence
    Presence(Presence),
    Typing(Typing),

    // Notifications
    PageNotification(PageNotification),
    Poke(Poke),
    FriendRequestState(FriendRequestState),
    FriendRequestCounts(FriendRequestCounts),
    FriendRequestRemoved(FriendRequestRemoved),
}

impl Delta {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::MessageBump(_) => EventKind::MessageBump,
            Self::Reaction(_) => EventKind::MessageReaction,
            Self::Unsend(_) => EventKind::MessageUnsent,
            Self::Remove(_) => EventKind::MessageRemove,
            Self::ReadReceipt(_) => EventKind::MessageSeen,
            Self::DeliveryReceipt(_) => EventKind::MessageDelivered,
            Self::MarkRead(_) => EventKind::MarkRead,
            Self::MarkUnread(_) => EventKind::MarkUnread,
            Self::FolderSeen(_) => EventKind::FolderSeen,
            Self::AdminRemoved(_) => EventKind::AdminRemoved,
            Self::ApprovalMode(_) => EventKind::ApprovalModeChange,
            Self::ApprovalQueue(_) => EventKind::ApprovalQueue,
            Self::JoinableMode(_) => EventKind::JoinableModeChange,
            Self::ParticipantsAdded(_) => EventKind::ParticipantJoined,
            Self::ParticipantLeft(_) => EventKind::ParticipantLeft,
            Self::ThreadName(_) => EventKind::ThreadNameChange,
            Self::ThreadMuteSettings(_) => EventKind::ThreadMuteSettings,
            Self::ThreadMute(_) => EventKind::ThreadMute,
            Self::ThreadAction(_) => EventKind::ThreadAction,
            Self::ThreadFolderMove(_) => EventKind::ThreadFolderMove,
            Self::ThreadDelete(_) => EventKind::ThreadDelete,
            Self::ForcedFetch(_) => EventKind::ThreadForcedFetch,
            Self::ViewerStatus(_) => EventKind::ViewerStatusChange,
            Self::AdminText(a) => a.kind,
            Self::Presence(_) => EventKind::Presence,
            Self::Typing(_) => EventKind::Typing,
            Self::PageNotification(_) => EventKind::PageNotification,
            Self::Poke(_) => EventKind::PokeNotification,
            Self::FriendRequestState(_) => EventKind::FriendRequestChange,
            Self::FriendRequestCounts(_) => EventKind::FriendRequestListUpdate,
            Self::FriendRequestRemoved(_) => EventKind::FriendRequestRemoved,
        }
    }

    /// The message carried by `Message` / `MessageBump` deltas.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) | Self::MessageBump(m) => Some(m),
            _ => None,
        }
    }

    /// Admin text becomes two arguments (payload, metadata); every other
    /// delta is delivered as a single argument.
    pub fn into_event(self) -> Event {
        let kind = self.kind();
        let args = match self {
            Self::AdminText(AdminTextDelta {
                payload, metadata, ..
            }) => vec![EventArg::AdminText(payload), EventArg::Metadata(metadata)],
            other => vec![EventArg::Delta(other)],
        };
        Event { kind, args }
    }
}

impl From<Delta> for Event {
    fn from(delta: Delta) -> Self {
        delta.into_event()
    }
}
