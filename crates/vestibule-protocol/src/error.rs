//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame parsed as JSON but violates the expected shape.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
