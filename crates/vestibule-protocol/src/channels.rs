//! Presence channel and key naming.
//!
//! Every process in the fleet derives the same names from the same ids,
//! so these formats are a cross-process contract:
//!
//! - `$<roomId>`: the per-room RPC channel the owning process listens on
//! - `<roomId>:<requestId>`: the per-request reply channel
//! - `<name>`: the per-room-type set of matchmaking-eligible room ids
//! - `<name>:c`: the per-room-type admission counter

use crate::RoomId;

/// The RPC channel for a room. The owning process subscribes to it.
pub fn room_channel(room_id: &RoomId) -> String {
    format!("${room_id}")
}

/// The reply channel for a single remote call.
pub fn reply_channel(room_id: &RoomId, request_id: &str) -> String {
    format!("{room_id}:{request_id}")
}

/// The admission counter key for a room type.
pub fn concurrency_key(name: &str) -> String {
    format!("{name}:c")
}
