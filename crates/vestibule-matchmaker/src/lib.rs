//! Matchmaker core for Vestibule.
//!
//! The matchmaker accepts join requests, selects or creates a room,
//! reserves a seat in it, and hands the client off to the owning
//! process. Three mechanisms underneath interact:
//!
//! - the fleet-wide **room registry** (any process reads, only the owner
//!   writes),
//! - the **remote room call**, a request/response RPC over presence
//!   pub/sub routed by room id,
//! - the **admission gate**, a per-room-type counter that staggers
//!   near-simultaneous joins so they converge on one room.
//!
//! Each has partial-failure modes (stale listings from ungraceful
//! shutdowns, seat races, call timeouts) that the matchmaker recovers
//! without corrupting the registry.

mod error;
mod matchmaker;
mod registration;
mod remote;

pub use error::{MatchmakeError, RemoteCallError};
pub use matchmaker::{Matchmaker, SeatReservation, MAX_SEAT_RESERVATION_ATTEMPTS};
pub use registration::RoomType;
pub use remote::{remote_call_timeout, SHORT_TIMEOUT_ENV};
