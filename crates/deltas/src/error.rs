/// Default number of payload bytes quoted in diagnostics.
pub const DEFAULT_EXCERPT_LIMIT: usize = 256;

/// A frame or delta that could not be decoded.
///
/// Only surfaced by the strict decode path; the passive path logs the
/// same information and drops the input.
#[derive(thiserror::Error, Debug)]
#[error("failed to decode {what} on {topic}: {source} (payload: {excerpt})")]
pub struct ParsingError {
    pub topic: String,
    /// Which part failed: `"frame"` or the delta class name.
    pub what: String,
    pub excerpt: String,
    #[source]
    pub source: serde_json::Error,
}

/// Lossy UTF-8 prefix of `payload`, at most `limit` bytes, with a
/// trailing ellipsis when truncated.
pub fn excerpt(payload: &[u8], limit: usize) -> String {
    if payload.len() <= limit {
        return String::from_utf8_lossy(payload).into_owned();
    }
    let mut out = String::from_utf8_lossy(&payload[..limit]).into_owned();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates() {
        assert_eq!(excerpt(b"abc", 10), "abc");
        assert_eq!(excerpt(b"abcdef", 3), "abc…");
    }
}
