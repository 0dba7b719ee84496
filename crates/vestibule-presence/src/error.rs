//! Error types for the presence layer.

/// Errors that can occur talking to the presence service.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The backing service failed or is unreachable.
    #[error("presence backend error: {0}")]
    Backend(String),

    /// The channel is gone (backend shut down mid-operation).
    #[error("presence channel '{0}' is closed")]
    ChannelClosed(String),
}
