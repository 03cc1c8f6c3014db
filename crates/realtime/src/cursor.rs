//! Cursor tracking: the sequence id and sync token needed to bootstrap or
//! resume the delivery queue.
//!
//! Frames are scanned for the cursor fields directly in their bytes, so the
//! receive loop can keep the cursor current without fully decoding every
//! frame.

use ec_protocol::QueueBootstrap;
use parking_lot::Mutex;

const LAST_ISSUED_SEQ_ID: &[u8] = b"\"lastIssuedSeqId\"";
const FIRST_DELTA_SEQ_ID: &[u8] = b"\"firstDeltaSeqId\"";
const SYNC_TOKEN: &[u8] = b"\"syncToken\"";

/// Snapshot of the server-issued position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub sequence_id: Option<i64>,
    pub sync_token: Option<String>,
}

/// Shared cursor. The receive loop is the only writer in steady state;
/// the supervisor writes it while no receive loop is running.
#[derive(Debug, Default)]
pub struct CursorTracker {
    inner: Mutex<Cursor>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the sequence id from the baseline fetch, keeping any token.
    pub fn seed(&self, sequence_id: i64) {
        self.inner.lock().sequence_id = Some(sequence_id);
    }

    pub fn snapshot(&self) -> Cursor {
        self.inner.lock().clone()
    }

    /// Full resync: fresh sequence id, no sync token.
    pub fn reset_for_reconnect(&self, sequence_id: i64) {
        let mut cursor = self.inner.lock();
        cursor.sequence_id = Some(sequence_id);
        cursor.sync_token = None;
    }

    /// The bootstrap publish for the current state, if a sequence id is known.
    pub fn bootstrap(&self, user_id: &str) -> Option<QueueBootstrap> {
        let cursor = self.inner.lock();
        let seq = cursor.sequence_id?;
        Some(QueueBootstrap::for_cursor(
            user_id,
            seq,
            cursor.sync_token.as_deref(),
        ))
    }

    /// Apply any cursor fields found in `payload`. Returns true when the
    /// cursor changed.
    ///
    /// `lastIssuedSeqId` wins over `firstDeltaSeqId` in the same frame and
    /// the sequence id never moves backwards. A sync token always replaces
    /// the previous one.
    pub fn observe(&self, payload: &[u8]) -> bool {
        let seq = scan_integer(payload, LAST_ISSUED_SEQ_ID)
            .or_else(|| scan_integer(payload, FIRST_DELTA_SEQ_ID));
        let token = scan_string(payload, SYNC_TOKEN);
        if seq.is_none() && token.is_none() {
            return false;
        }

        let mut cursor = self.inner.lock();
        let mut changed = false;
        if let Some(seq) = seq {
            if cursor.sequence_id.map_or(true, |cur| seq > cur) {
                cursor.sequence_id = Some(seq);
                changed = true;
            }
        }
        if let Some(token) = token {
            if cursor.sync_token.as_deref() != Some(token.as_str()) {
                changed = true;
            }
            cursor.sync_token = Some(token);
        }
        if changed {
            tracing::trace!(
                sequence_id = ?cursor.sequence_id,
                has_sync_token = cursor.sync_token.is_some(),
                "cursor advanced"
            );
        }
        changed
    }
}

// ── byte scanning ───────────────────────────────────────────────────

/// Position just past `key` and the following `:`, skipping whitespace.
fn value_start(haystack: &[u8], key: &[u8]) -> Option<usize> {
    let at = haystack.windows(key.len()).position(|w| w == key)?;
    let mut i = skip_ws(haystack, at + key.len());
    if haystack.get(i) != Some(&b':') {
        return None;
    }
    i = skip_ws(haystack, i + 1);
    Some(i)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

/// Integer value of `key`, bare or quoted.
fn scan_integer(haystack: &[u8], key: &[u8]) -> Option<i64> {
    let mut i = value_start(haystack, key)?;
    let quoted = haystack.get(i) == Some(&b'"');
    if quoted {
        i += 1;
    }
    let start = i;
    if haystack.get(i) == Some(&b'-') {
        i += 1;
    }
    while haystack.get(i).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
    }
    std::str::from_utf8(&haystack[start..i]).ok()?.parse().ok()
}

/// String value of `key`. Escaped quotes end the scan conservatively.
fn scan_string(haystack: &[u8], key: &[u8]) -> Option<String> {
    let i = value_start(haystack, key)?;
    if haystack.get(i) != Some(&b'"') {
        return None;
    }
    let rest = &haystack[i + 1..];
    let end = rest.iter().position(|&b| b == b'"' || b == b'\\')?;
    if rest[end] == b'\\' {
        return None;
    }
    String::from_utf8(rest[..end].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_issued_seq_id_updates_sequence() {
        let t = CursorTracker::new();
        t.seed(10);
        assert!(t.observe(br#"{"deltas":[],"lastIssuedSeqId":500}"#));
        assert_eq!(t.snapshot().sequence_id, Some(500));
        assert_eq!(t.snapshot().sync_token, None);
    }

    #[test]
    fn last_issued_wins_over_first_delta() {
        let t = CursorTracker::new();
        t.observe(br#"{"firstDeltaSeqId":900,"lastIssuedSeqId":700}"#);
        assert_eq!(t.snapshot().sequence_id, Some(700));
    }

    #[test]
    fn first_delta_used_when_alone() {
        let t = CursorTracker::new();
        t.observe(br#"{"firstDeltaSeqId": 33, "syncToken":"1","queueEntityId":1}"#);
        let c = t.snapshot();
        assert_eq!(c.sequence_id, Some(33));
        assert_eq!(c.sync_token.as_deref(), Some("1"));
    }

    #[test]
    fn sequence_never_regresses() {
        let t = CursorTracker::new();
        t.seed(100);
        assert!(!t.observe(br#"{"lastIssuedSeqId":50}"#));
        assert_eq!(t.snapshot().sequence_id, Some(100));
    }

    #[test]
    fn same_frame_twice_is_idempotent() {
        let t = CursorTracker::new();
        let frame = br#"{"lastIssuedSeqId":"42","syncToken":"abc"}"#;
        assert!(t.observe(frame));
        assert!(!t.observe(frame));
        let c = t.snapshot();
        assert_eq!(c.sequence_id, Some(42));
        assert_eq!(c.sync_token.as_deref(), Some("abc"));
    }

    #[test]
    fn newest_sync_token_always_adopted() {
        let t = CursorTracker::new();
        t.observe(br#"{"syncToken":"a"}"#);
        t.observe(br#"{"syncToken":"b"}"#);
        assert_eq!(t.snapshot().sync_token.as_deref(), Some("b"));
    }

    #[test]
    fn frames_without_markers_change_nothing() {
        let t = CursorTracker::new();
        assert!(!t.observe(br#"{"deltas":[{"class":"NoOp"}]}"#));
        assert!(!t.observe(b"\x00\x01garbage"));
        assert_eq!(t.snapshot(), Cursor::default());
    }

    #[test]
    fn reset_clears_token() {
        let t = CursorTracker::new();
        t.observe(br#"{"lastIssuedSeqId":5,"syncToken":"tok"}"#);
        t.reset_for_reconnect(3);
        let c = t.snapshot();
        assert_eq!(c.sequence_id, Some(3));
        assert_eq!(c.sync_token, None);
    }

    #[test]
    fn bootstrap_follows_token() {
        let t = CursorTracker::new();
        assert!(t.bootstrap("1").is_none());
        t.seed(8);
        assert_eq!(t.bootstrap("1").unwrap().topic(), "/messenger_sync_create_queue");
        t.observe(br#"{"syncToken":"x"}"#);
        assert_eq!(t.bootstrap("1").unwrap().topic(), "/messenger_sync_get_diffs");
    }

    #[test]
    fn key_without_colon_is_ignored() {
        assert_eq!(scan_integer(br#"["lastIssuedSeqId", 4]"#, LAST_ISSUED_SEQ_ID), None);
    }
}
