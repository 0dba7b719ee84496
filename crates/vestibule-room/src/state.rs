//! Room lifecycle state machine.

use std::fmt;

/// The lifecycle state of a local room handle.
///
/// Transitions are monotone: forward only, skipping allowed, never
/// backward.
///
/// ```text
/// Creating → Created → Disconnecting → Disposed
/// ```
///
/// - **Creating**: `on_create` is running; the room is not yet
///   reachable by matchmaking.
/// - **Created**: the room accepts seat reservations and joins.
/// - **Disconnecting**: graceful shutdown is booting the clients.
/// - **Disposed**: the listing is gone and the actor has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Creating,
    Created,
    Disconnecting,
    Disposed,
}

impl RoomState {
    fn rank(self) -> u8 {
        match self {
            Self::Creating => 0,
            Self::Created => 1,
            Self::Disconnecting => 2,
            Self::Disposed => 3,
        }
    }

    /// The next state in the canonical chain, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Creating => Some(Self::Created),
            Self::Created => Some(Self::Disconnecting),
            Self::Disconnecting => Some(Self::Disposed),
            Self::Disposed => None,
        }
    }

    /// Returns `true` if moving to `target` keeps the state machine
    /// monotone.
    pub fn can_transition_to(self, target: Self) -> bool {
        target.rank() > self.rank()
    }

    /// Returns `true` if the room accepts reservations and joins.
    pub fn is_accepting(self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "Creating"),
            Self::Created => write!(f, "Created"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}
