//! Room configuration.

use std::time::Duration;

use serde_json::{Map, Value};

/// Configuration for rooms of a given type.
///
/// Set on the room-type registration; `on_create` can adjust the
/// per-room values through [`RoomSetup`].
#[derive(Debug, Clone)]
pub struct RoomOptions {
    /// Maximum seats (connected clients plus unexpired reservations).
    pub max_clients: u32,

    /// Private rooms never appear in public queries.
    pub private: bool,

    /// Dispose the room automatically once it has no occupants.
    pub auto_dispose: bool,

    /// How long a reserved seat stays claimable. A room that never
    /// receives a reservation also disposes after this long.
    pub seat_reservation_ttl: Duration,

    /// How often the actor sweeps expired reservations.
    pub reservation_sweep_interval: Duration,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            max_clients: 8,
            private: false,
            auto_dispose: true,
            seat_reservation_ttl: Duration::from_secs(8),
            reservation_sweep_interval: Duration::from_secs(1),
        }
    }
}

/// The per-room values `on_create` may adjust before the room goes live.
///
/// `metadata` entries end up as top-level fields of the room's listing,
/// queryable by matchmaking conditions.
#[derive(Debug, Clone)]
pub struct RoomSetup {
    pub max_clients: u32,
    pub private: bool,
    pub auto_dispose: bool,
    pub metadata: Map<String, Value>,
}

impl From<&RoomOptions> for RoomSetup {
    fn from(options: &RoomOptions) -> Self {
        Self {
            max_clients: options.max_clients,
            private: options.private,
            auto_dispose: options.auto_dispose,
            metadata: Map::new(),
        }
    }
}
