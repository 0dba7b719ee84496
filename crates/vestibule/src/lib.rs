//! # Vestibule
//!
//! Matchmaking core for multi-process realtime game-room servers.
//!
//! A client asks for a seat in a room of some type; the matchmaker picks
//! or creates a room somewhere in the fleet, reserves the seat, and the
//! client connects to the owning process to claim it. Room types are
//! registered with a [`RoomType`](vestibule_matchmaker::RoomType) and
//! implement [`RoomLogic`](vestibule_room::RoomLogic).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vestibule::prelude::*;
//!
//! # async fn run() -> Result<(), VestibuleError> {
//! let server = VestibuleServerBuilder::new()
//!     .bind("0.0.0.0:2567")
//!     .build()
//!     .await?;
//! server.define("chat", RoomType::new(|| NoopRoom)).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod server;

pub use error::VestibuleError;
pub use server::{VestibuleServer, VestibuleServerBuilder};

/// Re-exports everything a room-server developer needs.
pub mod prelude {
    pub use crate::{VestibuleError, VestibuleServer, VestibuleServerBuilder};

    pub use vestibule_matchmaker::{
        MatchmakeError, Matchmaker, RemoteCallError, RoomType, SeatReservation,
    };
    pub use vestibule_presence::{LocalPresence, Presence, PresenceError, Subscription};
    pub use vestibule_protocol::{
        codes, ClientOptions, ErrorResponse, ProcessId, ProtocolError, RoomId, SessionId,
    };
    pub use vestibule_registry::{
        Direction, Driver, MemoryDriver, QueryConditions, RegistryError, RoomListing, SortSpec,
    };
    pub use vestibule_room::{
        ClientRef, NoopRoom, RoomError, RoomHandle, RoomInfo, RoomLogic, RoomOptions, RoomSetup,
        RoomState,
    };
    pub use vestibule_transport::{TransportConfig, TransportError, WsTransport};
}
