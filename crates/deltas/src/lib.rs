//! Delta decoding for the edge-chat realtime stream.
//!
//! Raw frames (topic + JSON bytes) go in, [`Delta`]s come out. Each delta
//! maps to exactly one [`EventKind`] and converts into a dispatchable
//! [`Event`]. Decoding is two-level: a tagged union on `"class"` for the
//! main stream, then a second pass for admin-text deltas whose payload
//! shape depends on a type name.

pub mod admin_text;
pub mod decoder;
pub mod delta;
pub mod error;
pub mod event;
pub mod kind;
pub mod message;
pub mod normalize;
pub mod notification;
pub mod presence;
pub mod receipt;
pub mod thread;

pub use admin_text::AdminText;
pub use decoder::DeltaDecoder;
pub use delta::{AdminTextDelta, Delta};
pub use error::ParsingError;
pub use event::{Event, EventArg};
pub use kind::EventKind;
pub use message::{Attachment, AttachmentKind, Mention, Message, MessageMetadata};
