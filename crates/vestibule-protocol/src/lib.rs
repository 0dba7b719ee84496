//! Wire protocol for Vestibule.
//!
//! This crate defines everything that crosses a process or network
//! boundary in the matchmaking core:
//!
//! - **Identifiers** ([`RoomId`], [`SessionId`], [`ProcessId`]): opaque
//!   short ids and their generation.
//! - **Codes** ([`codes`]): the wire-stable integers for matchmaking
//!   errors, WebSocket closes, and IPC replies.
//! - **Channels** ([`channels`]): the presence channel and key naming
//!   scheme shared by every process.
//! - **Wire messages** ([`ErrorResponse`], option merging): the JSON
//!   bodies exchanged with clients.
//! - **IPC messages** ([`RoomCall`], [`RoomCallReply`]): the pub/sub
//!   request/reply frames used for cross-process room calls.
//!
//! The protocol layer knows nothing about rooms, registries, or
//! transports. It only defines shapes and how they serialize.

mod error;
mod ids;
mod ipc;
mod wire;

pub mod channels;
pub mod codes;

pub use error::ProtocolError;
pub use ids::{random_id, ProcessId, RoomId, SessionId};
pub use ipc::{RoomCall, RoomCallReply};
pub use wire::{merge_options, ClientOptions, ErrorResponse};
