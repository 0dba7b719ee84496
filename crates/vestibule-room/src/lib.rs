//! Room layer for Vestibule.
//!
//! Each live room is an isolated Tokio task (actor model) owning its
//! lifecycle state, seat-reservation table, and connected clients. The
//! outside world talks to it through a [`RoomHandle`]; the matchmaker
//! additionally consumes the typed [`RoomEvent`] stream the actor emits
//! to keep the fleet-wide listing in sync.
//!
//! A room exists only on its owning process. Every other process reaches
//! it through the matchmaker's remote room call, which bottoms out in the
//! same [`RoomHandle`] on the owner.

mod error;
mod logic;
mod options;
mod room;
mod state;

pub use error::RoomError;
pub use logic::{ClientRef, NoopRoom, RoomLogic};
pub use options::{RoomOptions, RoomSetup};
pub use room::{spawn_room, RoomEvent, RoomHandle, RoomInfo, SpawnedRoom};
pub use state::RoomState;
