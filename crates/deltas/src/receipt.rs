//! Read/delivery receipts and mark-read style updates.

use serde::Deserialize;

use crate::normalize::{flat_string, flat_string_vec, lenient_i64, opt_flat_string, opt_lenient_i64};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadReceipt {
    #[serde(rename = "actionTimestampMs", deserialize_with = "lenient_i64")]
    pub read_at: i64,
    #[serde(rename = "watermarkTimestampMs", deserialize_with = "lenient_i64")]
    pub watermark: i64,
    #[serde(rename = "actorFbId", default, deserialize_with = "flat_string")]
    pub reader_id: String,
    #[serde(rename = "folderId", default, deserialize_with = "opt_flat_string")]
    pub folder: Option<String>,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(rename = "deliveredWatermarkTimestampMs", deserialize_with = "lenient_i64")]
    pub watermark: i64,
    #[serde(rename = "messageIds", default, deserialize_with = "flat_string_vec")]
    pub message_ids: Vec<String>,
    #[serde(rename = "threadKey", deserialize_with = "flat_string")]
    pub thread_id: String,
    /// Absent in one-to-one threads.
    #[serde(rename = "actorFbId", default, deserialize_with = "opt_flat_string")]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderSeen {
    #[serde(default, deserialize_with = "flat_string_vec")]
    pub folders: Vec<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkRead {
    #[serde(rename = "actionTimestamp", deserialize_with = "lenient_i64")]
    pub marked_at: i64,
    #[serde(rename = "threadKeys", default, deserialize_with = "flat_string_vec")]
    pub thread_ids: Vec<String>,
    #[serde(rename = "watermarkTimestamp", default, deserialize_with = "opt_lenient_i64")]
    pub watermark: Option<i64>,
    #[serde(rename = "folderId", default, deserialize_with = "opt_flat_string")]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkUnread {
    #[serde(rename = "actionTimestamp", deserialize_with = "lenient_i64")]
    pub marked_at: i64,
    #[serde(rename = "threadKeys", default, deserialize_with = "flat_string_vec")]
    pub thread_ids: Vec<String>,
}
