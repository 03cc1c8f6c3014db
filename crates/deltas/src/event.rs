use crate::admin_text::AdminText;
use crate::delta::Delta;
use crate::kind::EventKind;
use crate::message::{Message, MessageMetadata};

/// One positional argument of an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    Delta(Delta),
    AdminText(AdminText),
    Metadata(MessageMetadata),
    /// Description attached to `error` and `disconnect` events.
    Reason(String),
}

/// A semantic event ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub args: Vec<EventArg>,
}

impl Event {
    /// An event with no decoded payload (`listening`, `reconnect`).
    pub fn lifecycle(kind: EventKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    pub fn with_reason(kind: EventKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            args: vec![EventArg::Reason(reason.into())],
        }
    }

    pub fn delta(&self) -> Option<&Delta> {
        self.args.iter().find_map(|a| match a {
            EventArg::Delta(d) => Some(d),
            _ => None,
        })
    }

    pub fn message(&self) -> Option<&Message> {
        self.delta().and_then(Delta::message)
    }

    pub fn admin_text(&self) -> Option<&AdminText> {
        self.args.iter().find_map(|a| match a {
            EventArg::AdminText(t) => Some(t),
            _ => None,
        })
    }

    pub fn metadata(&self) -> Option<&MessageMetadata> {
        self.args.iter().find_map(|a| match a {
            EventArg::Metadata(m) => Some(m),
            _ => None,
        })
    }

    pub fn reason(&self) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            EventArg::Reason(r) => Some(r.as_str()),
            _ => None,
        })
    }
}
