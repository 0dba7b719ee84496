//! Error types for the matchmaking layer.

use std::time::Duration;

use vestibule_presence::PresenceError;
use vestibule_protocol::{codes, RoomId, SessionId};
use vestibule_registry::RegistryError;
use vestibule_room::RoomError;

/// Errors that can occur during a remote room call.
///
/// Callers must be able to tell a timeout (the owning process is
/// presumed dead, which is the stale-cleanup signal) from a remote
/// error (the owner is alive but the call failed).
#[derive(Debug, thiserror::Error)]
pub enum RemoteCallError {
    /// No reply arrived within the deadline.
    #[error("remote call '{method}' on room {room_id} timed out after {timeout:?}")]
    Timeout {
        room_id: RoomId,
        method: String,
        timeout: Duration,
    },

    /// The owning process replied with an error.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The presence layer failed underneath the call.
    #[error(transparent)]
    Presence(#[from] PresenceError),
}

/// Errors that can occur during a matchmaking operation.
///
/// `SeatReservation` is the sole retriable kind: `join_or_create` and
/// `join` retry it, everything else aborts the operation.
#[derive(Debug, thiserror::Error)]
pub enum MatchmakeError {
    /// No room handler is registered under this type name.
    #[error("no room handler registered for '{0}'")]
    NoHandler(String),

    /// No existing room satisfied the matchmaking criteria.
    #[error("no rooms matched the provided criteria for '{0}'")]
    InvalidCriteria(String),

    /// The room id is unknown, or the room is locked.
    #[error("room '{0}' not found or locked")]
    InvalidRoomId(RoomId),

    /// The seat reservation for this session has expired.
    #[error("seat reservation for session '{0}' expired")]
    Expired(SessionId),

    /// The room refused the seat (filled or locked in the meantime).
    #[error("seat reservation failed on room {0}")]
    SeatReservation(RoomId),

    /// An unexposed method, or a failure inside user room code. The
    /// original message is preserved for the client.
    #[error("{0}")]
    Unhandled(String),

    /// Graceful shutdown is in progress.
    #[error("graceful shutdown already in progress")]
    ShuttingDown,

    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

impl MatchmakeError {
    /// The wire-stable error code sent to clients.
    pub fn code(&self) -> u16 {
        match self {
            Self::NoHandler(_) => codes::ERR_MATCHMAKE_NO_HANDLER,
            Self::InvalidCriteria(_) => codes::ERR_MATCHMAKE_INVALID_CRITERIA,
            Self::InvalidRoomId(_) => codes::ERR_MATCHMAKE_INVALID_ROOM_ID,
            Self::Expired(_) => codes::ERR_MATCHMAKE_EXPIRED,
            _ => codes::ERR_MATCHMAKE_UNHANDLED,
        }
    }
}
