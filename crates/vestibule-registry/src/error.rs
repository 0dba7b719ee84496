//! Error types for the registry layer.

/// Errors that can occur talking to the registry backend.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The backing store failed or is unreachable.
    #[error("registry backend error: {0}")]
    Backend(String),

    /// A stored listing failed to decode.
    #[error("corrupt listing: {0}")]
    Corrupt(String),
}
