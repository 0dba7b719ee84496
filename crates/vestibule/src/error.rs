//! Unified error type for the Vestibule meta-crate.

use vestibule_matchmaker::MatchmakeError;
use vestibule_presence::PresenceError;
use vestibule_protocol::ProtocolError;
use vestibule_registry::RegistryError;
use vestibule_room::RoomError;
use vestibule_transport::TransportError;

/// Top-level error wrapping every layer's error type.
///
/// With the meta-crate you deal with this single type; `?` converts the
/// layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VestibuleError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Matchmake(#[from] MatchmakeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
