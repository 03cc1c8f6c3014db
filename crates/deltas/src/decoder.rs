//! Frame → delta decoding.
//!
//! Two entry points share one implementation:
//!
//! - [`DeltaDecoder::decode_frame`] is the passive path used by the
//!   session. It never fails: anything undecodable is logged with a
//!   bounded payload excerpt and dropped, one delta at a time, so a bad
//!   entry never takes its neighbours down with it.
//! - [`DeltaDecoder::try_decode_frame`] is the strict path for callers
//!   that asked for a fetch-style decode and want a [`ParsingError`].

use ec_protocol::TopicClass;
use serde::Deserialize;
use serde_json::Value;

use crate::admin_text::{decoder_for, is_admin_removal, kind_for};
use crate::delta::{AdminTextDelta, ClientDelta, Delta, RawDelta, WireAdminText};
use crate::error::{excerpt, ParsingError, DEFAULT_EXCERPT_LIMIT};
use crate::event::Event;
use crate::message::Message;
use crate::notification::WireNotification;
use crate::presence::{Presence, Typing};

/// Frames that only acknowledge a fresh queue carry this and no deltas.
const FIRST_FETCH_MARKER: &[u8] = br#""syncToken":"1""#;
const TYPING_MARKER: &[u8] = br#""type":"typ""#;
const PRESENCE_MARKER: &[u8] = br#""list_type""#;

#[derive(Deserialize)]
struct DeltaBatch {
    #[serde(default)]
    deltas: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Passive,
    Strict,
}

#[derive(Debug, Clone)]
pub struct DeltaDecoder {
    excerpt_limit: usize,
}

impl Default for DeltaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self {
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
        }
    }

    /// Bound on payload bytes quoted in diagnostics.
    pub fn with_excerpt_limit(mut self, limit: usize) -> Self {
        self.excerpt_limit = limit;
        self
    }

    /// Decode everything decodable in a frame; log and drop the rest.
    pub fn decode_frame(&self, topic: &str, payload: &[u8]) -> Vec<Delta> {
        match self.decode(topic, payload, Mode::Passive) {
            Ok(deltas) => deltas,
            Err(err) => {
                tracing::warn!(
                    topic = %err.topic,
                    what = %err.what,
                    error = %err.source,
                    payload = %err.excerpt,
                    "dropping undecodable frame"
                );
                Vec::new()
            }
        }
    }

    /// Decode a frame, failing on the first hard parse error.
    pub fn try_decode_frame(&self, topic: &str, payload: &[u8]) -> Result<Vec<Delta>, ParsingError> {
        self.decode(topic, payload, Mode::Strict)
    }

    /// Passive decode straight to dispatchable events.
    pub fn decode_events(&self, topic: &str, payload: &[u8]) -> Vec<Event> {
        self.decode_frame(topic, payload)
            .into_iter()
            .map(Delta::into_event)
            .collect()
    }

    fn decode(&self, topic: &str, payload: &[u8], mode: Mode) -> Result<Vec<Delta>, ParsingError> {
        match TopicClass::of(topic) {
            TopicClass::Deltas => self.decode_batch(topic, payload, mode),
            TopicClass::Typing => {
                if topic == ec_protocol::topics::THREAD_TYPING && !contains(payload, TYPING_MARKER) {
                    return Ok(Vec::new());
                }
                let typing: Typing = self.parse(topic, "typing", payload)?;
                Ok(vec![Delta::Typing(typing)])
            }
            TopicClass::Presence => {
                if !contains(payload, PRESENCE_MARKER) {
                    return Ok(Vec::new());
                }
                let presence: Presence = self.parse(topic, "presence", payload)?;
                Ok(vec![Delta::Presence(presence)])
            }
            TopicClass::Notification => self.decode_notification(topic, payload),
            TopicClass::Response | TopicClass::Ignored => Ok(Vec::new()),
            TopicClass::Unrecognized => {
                tracing::debug!(topic, "frame on unrecognized topic");
                Ok(Vec::new())
            }
        }
    }

    fn decode_batch(&self, topic: &str, payload: &[u8], mode: Mode) -> Result<Vec<Delta>, ParsingError> {
        let batch: DeltaBatch = self.parse(topic, "frame", payload)?;
        let Some(entries) = batch.deltas else {
            if contains(payload, FIRST_FETCH_MARKER) {
                tracing::debug!(topic, "first-fetch acknowledgement");
            } else {
                tracing::trace!(topic, "cursor-only frame");
            }
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.decode_entry(entry) {
                Ok(deltas) => out.extend(deltas),
                Err(source) => {
                    let class = entry
                        .get("class")
                        .and_then(Value::as_str)
                        .unwrap_or("<missing class>");
                    let err = ParsingError {
                        topic: topic.to_string(),
                        what: class.to_string(),
                        excerpt: excerpt(entry.to_string().as_bytes(), self.excerpt_limit),
                        source,
                    };
                    if mode == Mode::Strict {
                        return Err(err);
                    }
                    tracing::warn!(
                        topic,
                        class,
                        error = %err.source,
                        payload = %err.excerpt,
                        "dropping undecodable delta"
                    );
                }
            }
        }
        Ok(out)
    }

    fn decode_entry(&self, entry: &Value) -> Result<Vec<Delta>, serde_json::Error> {
        let raw = RawDelta::deserialize(entry)?;
        let deltas = match raw {
            RawDelta::NewMessage(m) => vec![Delta::Message(Message::from_wire(m, None))],
            RawDelta::ClientPayload(p) => p
                .payload
                .deltas
                .into_iter()
                .filter_map(ClientDelta::into_delta)
                .collect(),
            RawDelta::NoOp => Vec::new(),

            RawDelta::ReadReceipt(r) => vec![Delta::ReadReceipt(r)],
            RawDelta::DeliveryReceipt(r) => vec![Delta::DeliveryReceipt(r)],
            RawDelta::MarkFolderSeen(f) => vec![Delta::FolderSeen(f)],
            RawDelta::MarkRead(m) => vec![Delta::MarkRead(m)],
            RawDelta::MarkUnread(m) => vec![Delta::MarkUnread(m)],

            RawDelta::ApprovalMode(a) => vec![Delta::ApprovalMode(a)],
            RawDelta::ApprovalQueue(a) => vec![Delta::ApprovalQueue(a)],
            RawDelta::JoinableMode(j) => vec![Delta::JoinableMode(j)],
            RawDelta::ParticipantsAddedToGroupThread(p) => vec![Delta::ParticipantsAdded(p)],
            RawDelta::ParticipantLeftGroupThread(p) => vec![Delta::ParticipantLeft(p)],
            RawDelta::AdminRemovedFromGroupThread(a) => vec![Delta::AdminRemoved(a)],
            RawDelta::ThreadName(t) => vec![Delta::ThreadName(t)],
            RawDelta::ThreadMuteSettings(t) => vec![Delta::ThreadMuteSettings(t)],
            RawDelta::ThreadAction(t) => vec![Delta::ThreadAction(t)],
            RawDelta::ThreadFolder(t) => vec![Delta::ThreadFolderMove(t)],
            RawDelta::ThreadDelete(t) => vec![Delta::ThreadDelete(t)],
            RawDelta::ForcedFetch(f) => vec![Delta::ForcedFetch(f)],
            RawDelta::AdminTextMessage(a) => decode_admin_text(a)?.into_iter().collect(),

            RawDelta::Unknown => {
                let class = entry.get("class").and_then(Value::as_str).unwrap_or("");
                tracing::debug!(class, "skipping unknown delta class");
                Vec::new()
            }
        };
        Ok(deltas)
    }

    fn decode_notification(&self, topic: &str, payload: &[u8]) -> Result<Vec<Delta>, ParsingError> {
        let wire: WireNotification = self.parse(topic, "notification", payload)?;
        Ok(match wire {
            WireNotification::Poke(p) => vec![Delta::Poke(p)],
            WireNotification::FriendRequestState(s) => vec![Delta::FriendRequestState(s)],
            WireNotification::FriendRequestCounts(c) => vec![Delta::FriendRequestCounts(c)],
            WireNotification::FriendRequestRemoved(r) => vec![Delta::FriendRequestRemoved(r)],
            WireNotification::Ignored => Vec::new(),
            WireNotification::Unknown => {
                tracing::debug!(topic, "skipping unknown notification type");
                Vec::new()
            }
        })
    }

    fn parse<T: serde::de::DeserializeOwned>(
        &self,
        topic: &str,
        what: &str,
        payload: &[u8],
    ) -> Result<T, ParsingError> {
        serde_json::from_slice(payload).map_err(|source| ParsingError {
            topic: topic.to_string(),
            what: what.to_string(),
            excerpt: excerpt(payload, self.excerpt_limit),
            source,
        })
    }
}

/// Second pass over `AdminTextMessage`. Unlisted type names and admin
/// removals yield nothing; a listed type whose body does not fit its
/// decoder is an error like any other delta.
fn decode_admin_text(wire: WireAdminText) -> Result<Option<Delta>, serde_json::Error> {
    if is_admin_removal(&wire.untyped) {
        return Ok(None);
    }
    let (Some(decode), Some(kind)) = (decoder_for(&wire.type_name), kind_for(&wire.type_name)) else {
        tracing::debug!(type_name = %wire.type_name, "skipping unlisted admin text");
        return Ok(None);
    };
    let untyped = match wire.untyped {
        Value::String(s) => serde_json::from_str(&s)?,
        other => other,
    };
    Ok(Some(Delta::AdminText(AdminTextDelta {
        kind,
        payload: decode(untyped)?,
        metadata: wire.metadata,
    })))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
