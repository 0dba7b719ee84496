//! Error types for the room layer.

use vestibule_protocol::{RoomId, SessionId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's command channel is closed; the actor is gone.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// No seat is reserved for this session.
    #[error("no reserved seat for session {0}")]
    NoReservation(SessionId),

    /// The seat reservation for this session has expired.
    #[error("seat reservation for session {0} expired")]
    SeatExpired(SessionId),

    /// No property or method with this name exists on the room.
    #[error("unknown room method '{0}'")]
    UnknownMethod(String),

    /// The room is in a state that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// User room logic rejected the operation.
    #[error("{0}")]
    Rejected(String),
}

impl RoomError {
    /// Shorthand for a user-logic rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
