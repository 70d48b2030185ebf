use thiserror::Error;

/// Errors raised while encoding, decoding or emitting envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line exceeds {limit} bytes ({actual} bytes)")]
    LineTooLarge { limit: usize, actual: usize },

    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported protocol version {0:?}")]
    VersionMismatch(String),

    #[error("envelope is missing a message type")]
    MissingType,

    #[error("envelope sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("envelope sink unavailable: {0}")]
    SinkUnavailable(String),
}
