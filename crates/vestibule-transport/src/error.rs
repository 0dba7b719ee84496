//! Error types for the transport layer.

/// Errors that can occur in the WebSocket transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The WebSocket upgrade handshake failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The request path matched neither transport route.
    #[error("invalid request path: {0}")]
    InvalidPath(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The socket closed before the matchmake request arrived.
    #[error("connection closed before the matchmake request")]
    ClosedEarly,
}
