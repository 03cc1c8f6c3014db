//! Second-pass decoding of `AdminTextMessage` deltas.
//!
//! The outer delta carries a `type` name and an `untypedData` document
//! whose shape depends on that name. Two tables drive the second pass:
//! one maps the name to a decoder, the other to the event kind. Names
//! missing from the tables are not admin text we surface.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::kind::EventKind;
use crate::normalize::flat_string;

/// Raw key/value fields for admin-text types without a fixed shape.
pub type UntypedFields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum AdminText {
    AdminAdded(AdminAdded),
    Nickname(NicknameChange),
    Theme(ThemeChange),
    QuickReaction(EmojiChange),
    MagicWords(MagicWordsChange),
    MessageSharing(MessageSharingChange),
    MessagePinned(PinChange),
    MessageUnpinned(PinChange),
    JoinableLinkReset(UntypedFields),
    JoinableModeChange(UntypedFields),
    GameUpdate(UntypedFields),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdminAdded {
    #[serde(rename = "TARGET_ID", deserialize_with = "flat_string")]
    pub user_id: String,
    #[serde(rename = "THREAD_CATEGORY", default)]
    pub thread_category: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NicknameChange {
    #[serde(default)]
    pub nickname: String,
    #[serde(rename = "participant_id", deserialize_with = "flat_string")]
    pub participant_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThemeChange {
    #[serde(deserialize_with = "flat_string")]
    pub theme_id: String,
    #[serde(rename = "theme_name_with_subtitle", default)]
    pub theme_name: String,
    #[serde(default)]
    pub theme_emoji: String,
    #[serde(default)]
    pub theme_type: String,
    #[serde(default)]
    pub theme_color: String,
    #[serde(default)]
    pub gradient: String,
    #[serde(default)]
    pub accessibility_label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmojiChange {
    #[serde(rename = "thread_quick_reaction_emoji")]
    pub emoji: String,
    #[serde(rename = "thread_quick_reaction_emoji_url", default)]
    pub emoji_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MagicWordsChange {
    pub magic_word: String,
    #[serde(default)]
    pub theme_name: String,
    #[serde(rename = "emoji_effect", default)]
    pub emoji: String,
    #[serde(default, deserialize_with = "flat_string")]
    pub removed_magic_word_count: String,
    #[serde(default, deserialize_with = "flat_string")]
    pub new_magic_word_count: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageSharingChange {
    /// `"enabled"` or `"disabled"`.
    #[serde(rename = "limit_sharing_type")]
    pub mode: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default, deserialize_with = "flat_string")]
    pub sender_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PinChange {
    #[serde(rename = "pinned_message_id")]
    pub message_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lookup tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type AdminTextDecoder = fn(Value) -> Result<AdminText, serde_json::Error>;

static DECODERS: &[(&str, AdminTextDecoder)] = &[
    ("change_thread_admins", decode_admin_added),
    ("change_thread_nickname", decode_nickname),
    ("change_thread_theme", decode_theme),
    ("change_thread_quick_reaction", decode_quick_reaction),
    ("magic_words", decode_magic_words),
    ("limit_sharing", decode_message_sharing),
    ("pin_messages_v2", decode_pinned),
    ("unpin_messages_v2", decode_unpinned),
    ("joinable_group_link_reset", decode_link_reset),
    ("joinable_group_link_mode_change", decode_joinable_mode),
    ("instant_game_dynamic_custom_update", decode_game_update),
];

static KINDS: &[(&str, EventKind)] = &[
    ("change_thread_admins", EventKind::AdminAdded),
    ("change_thread_nickname", EventKind::NicknameChange),
    ("change_thread_theme", EventKind::ThemeChange),
    ("change_thread_quick_reaction", EventKind::EmojiChange),
    ("magic_words", EventKind::MagicWordsChange),
    ("limit_sharing", EventKind::MessageSharingChange),
    ("pin_messages_v2", EventKind::MessagePinned),
    ("unpin_messages_v2", EventKind::MessageUnpinned),
    ("joinable_group_link_reset", EventKind::JoinableLinkReset),
    ("joinable_group_link_mode_change", EventKind::JoinableModeChange),
    ("instant_game_dynamic_custom_update", EventKind::GameUpdate),
];

pub fn decoder_for(type_name: &str) -> Option<AdminTextDecoder> {
    DECODERS
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, decode)| *decode)
}

pub fn kind_for(type_name: &str) -> Option<EventKind> {
    KINDS
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, kind)| *kind)
}

/// Admin-removal shares `change_thread_admins` with admin-add; the
/// removal direction is already covered by `AdminRemovedFromGroupThread`.
pub fn is_admin_removal(untyped: &Value) -> bool {
    untyped.to_string().contains("remove_admin")
}

fn untyped(value: Value) -> Result<UntypedFields, serde_json::Error> {
    match value {
        Value::Null => Ok(Map::new()),
        other => serde_json::from_value(other),
    }
}

fn decode_admin_added(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::AdminAdded(serde_json::from_value(v)?))
}

fn decode_nickname(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::Nickname(serde_json::from_value(v)?))
}

fn decode_theme(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::Theme(serde_json::from_value(v)?))
}

fn decode_quick_reaction(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::QuickReaction(serde_json::from_value(v)?))
}

fn decode_magic_words(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::MagicWords(serde_json::from_value(v)?))
}

fn decode_message_sharing(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::MessageSharing(serde_json::from_value(v)?))
}

fn decode_pinned(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::MessagePinned(serde_json::from_value(v)?))
}

fn decode_unpinned(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::MessageUnpinned(serde_json::from_value(v)?))
}

fn decode_link_reset(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::JoinableLinkReset(untyped(v)?))
}

fn decode_joinable_mode(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::JoinableModeChange(untyped(v)?))
}

fn decode_game_update(v: Value) -> Result<AdminText, serde_json::Error> {
    Ok(AdminText::GameUpdate(untyped(v)?))
}
