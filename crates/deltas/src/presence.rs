//! Presence lists and typing indicators.

use serde::Deserialize;

use crate::normalize::{flat_string, lenient_i64, opt_flat_string};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserStatus {
    #[serde(rename = "u", deserialize_with = "flat_string")]
    pub user_id: String,
    /// `0` offline, non-zero online or idle.
    #[serde(rename = "p", default, deserialize_with = "lenient_i64")]
    pub status: i64,
    /// Last active, epoch seconds. `0` when unknown.
    #[serde(rename = "l", default, deserialize_with = "lenient_i64")]
    pub last_active: i64,
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        self.status != 0
    }
}

/// A presence list. `full` lists replace the known state, `inc` lists
/// patch it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Presence {
    #[serde(rename = "list_type")]
    pub list_type: String,
    #[serde(default)]
    pub list: Vec<UserStatus>,
}

impl Presence {
    pub fn is_full(&self) -> bool {
        self.list_type == "full"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Typing {
    #[serde(rename = "sender_fbid", deserialize_with = "flat_string")]
    pub sender_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub state: i64,
    /// Group thread id; absent for one-to-one conversations.
    #[serde(rename = "thread", default, deserialize_with = "opt_flat_string")]
    pub thread_id: Option<String>,
}

impl Typing {
    pub fn is_typing(&self) -> bool {
        self.state == 1
    }
}
