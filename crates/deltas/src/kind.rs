//! The closed set of semantic event kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every event the dispatcher can deliver.
///
/// Each decoded delta maps to exactly one kind. The lifecycle kinds
/// (`Listening`, `Reconnect`, `Disconnect`, `Error`) are produced by the
/// session itself rather than by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // ── Lifecycle ────────────────────────────────────────────────────
    Listening,
    Reconnect,
    Disconnect,
    Error,

    // ── Messages ─────────────────────────────────────────────────────
    Message,
    MessageBump,
    MessageReaction,
    MessageUnsent,
    MessageRemove,
    MessagePinned,
    MessageUnpinned,

    // ── Receipts ─────────────────────────────────────────────────────
    MessageSeen,
    MessageDelivered,
    MarkRead,
    MarkUnread,
    FolderSeen,

    // ── Thread admin ─────────────────────────────────────────────────
    AdminAdded,
    AdminRemoved,
    ApprovalModeChange,
    ApprovalQueue,
    JoinableLinkReset,
    JoinableModeChange,
    ParticipantJoined,
    ParticipantLeft,
    ThreadNameChange,
    ThreadMuteSettings,
    ThreadMute,
    ThreadAction,
    ThreadFolderMove,
    ThreadDelete,
    ThreadForcedFetch,
    ViewerStatusChange,
    ThemeChange,
    EmojiChange,
    NicknameChange,
    MagicWordsChange,
    MessageSharingChange,
    GameUpdate,

    // ── Presence / typing ────────────────────────────────────────────
    Presence,
    Typing,

    // ── Notifications ────────────────────────────────────────────────
    PageNotification,
    PokeNotification,
    FriendRequestChange,
    FriendRequestListUpdate,
    FriendRequestRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 45] = [
        Self::Listening,
        Self::Reconnect,
        Self::Disconnect,
        Self::Error,
        Self::Message,
        Self::MessageBump,
        Self::MessageReaction,
        Self::MessageUnsent,
        Self::MessageRemove,
        Self::MessagePinned,
        Self::MessageUnpinned,
        Self::MessageSeen,
        Self::MessageDelivered,
        Self::MarkRead,
        Self::MarkUnread,
        Self::FolderSeen,
        Self::AdminAdded,
        Self::AdminRemoved,
        Self::ApprovalModeChange,
        Self::ApprovalQueue,
        Self::JoinableLinkReset,
        Self::JoinableModeChange,
        Self::ParticipantJoined,
        Self::ParticipantLeft,
        Self::ThreadNameChange,
        Self::ThreadMuteSettings,
        Self::ThreadMute,
        Self::ThreadAction,
        Self::ThreadFolderMove,
        Self::ThreadDelete,
        Self::ThreadForcedFetch,
        Self::ViewerStatusChange,
        Self::ThemeChange,
        Self::EmojiChange,
        Self::NicknameChange,
        Self::MagicWordsChange,
        Self::MessageSharingChange,
        Self::GameUpdate,
        Self::Presence,
        Self::Typing,
        Self::PageNotification,
        Self::PokeNotification,
        Self::FriendRequestChange,
        Self::FriendRequestListUpdate,
        Self::FriendRequestRemoved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Reconnect => "reconnect",
            Self::Disconnect => "disconnect",
            Self::Error => "error",
            Self::Message => "message",
            Self::MessageBump => "message_bump",
            Self::MessageReaction => "message_reaction",
            Self::MessageUnsent => "message_unsent",
            Self::MessageRemove => "message_remove",
            Self::MessagePinned => "message_pinned",
            Self::MessageUnpinned => "message_unpinned",
            Self::MessageSeen => "message_seen",
            Self::MessageDelivered => "message_delivered",
            Self::MarkRead => "mark_read",
            Self::MarkUnread => "mark_unread",
            Self::FolderSeen => "folder_seen",
            Self::AdminAdded => "admin_added",
            Self::AdminRemoved => "admin_removed",
            Self::ApprovalModeChange => "approval_mode_change",
            Self::ApprovalQueue => "approval_queue",
            Self::JoinableLinkReset => "joinable_link_reset",
            Self::JoinableModeChange => "joinable_mode_change",
            Self::ParticipantJoined => "participant_joined",
            Self::ParticipantLeft => "participant_left",
            Self::ThreadNameChange => "thread_name_change",
            Self::ThreadMuteSettings => "thread_mute_settings",
            Self::ThreadMute => "thread_mute",
            Self::ThreadAction => "thread_action",
            Self::ThreadFolderMove => "thread_folder_move",
            Self::ThreadDelete => "thread_delete",
            Self::ThreadForcedFetch => "thread_forced_fetch",
            Self::ViewerStatusChange => "viewer_status_change",
            Self::ThemeChange => "theme_change",
            Self::EmojiChange => "emoji_change",
            Self::NicknameChange => "nickname_change",
            Self::MagicWordsChange => "magic_words_change",
            Self::MessageSharingChange => "message_sharing_change",
            Self::GameUpdate => "game_update",
            Self::Presence => "presence",
            Self::Typing => "typing",
            Self::PageNotification => "page_notification",
            Self::PokeNotification => "poke_notification",
            Self::FriendRequestChange => "friend_request_change",
            Self::FriendRequestListUpdate => "friend_request_list_update",
            Self::FriendRequestRemoved => "friend_request_removed",
        }
    }

    /// Kinds emitted by the session rather than decoded from frames.
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            Self::Listening | Self::Reconnect | Self::Disconnect | Self::Error
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}
