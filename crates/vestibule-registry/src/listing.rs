//! The registry row describing a live room.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use vestibule_protocol::{ProcessId, RoomId};

/// One row per live room, visible to the whole fleet.
///
/// Besides the fixed fields, a listing carries an open set of
/// user-defined filter fields in `metadata`, projected from client join
/// options at creation. `metadata` entries serialize flat, as top-level
/// keys of the wire `room` object next to `roomId` and friends.
///
/// Invariants: exactly one listing per live room; `process_id` never
/// changes; a locked listing is ineligible for matchmaking queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub room_id: RoomId,
    /// The room type this listing was created under.
    pub name: String,
    pub process_id: ProcessId,
    pub locked: bool,
    pub private: bool,
    pub max_clients: u32,
    /// Effective occupancy: connected clients plus unexpired seat
    /// reservations, so a reservation is visible to the next query.
    pub clients: u32,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl RoomListing {
    pub fn new(room_id: RoomId, name: impl Into<String>, process_id: ProcessId) -> Self {
        Self {
            room_id,
            name: name.into(),
            process_id,
            locked: false,
            private: false,
            max_clients: 0,
            clients: 0,
            metadata: Map::new(),
        }
    }

    /// Looks up a field by its wire name, fixed fields first, then
    /// `metadata`. Used by condition matching and sorting.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "roomId" => Some(json!(self.room_id)),
            "name" => Some(json!(self.name)),
            "processId" => Some(json!(self.process_id)),
            "locked" => Some(json!(self.locked)),
            "private" => Some(json!(self.private)),
            "maxClients" => Some(json!(self.max_clients)),
            "clients" => Some(json!(self.clients)),
            other => self.metadata.get(other).cloned(),
        }
    }
}
