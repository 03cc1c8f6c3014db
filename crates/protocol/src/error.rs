/// Errors raised while framing or parsing wire data.
#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed remaining length")]
    MalformedLength,

    #[error("packet too large: {0} bytes")]
    TooLarge(usize),

    #[error("truncated {0} packet")]
    Truncated(&'static str),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("unsupported packet type {0}")]
    UnsupportedPacket(u8),

    #[error("unsupported QoS level {0}")]
    UnsupportedQos(u8),

    #[error("QoS 1 publish without packet id")]
    MissingPacketId,
}
