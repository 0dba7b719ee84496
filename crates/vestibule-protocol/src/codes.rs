//! Wire-stable integer codes.
//!
//! These values are part of the external contract: clients and other
//! processes match on the numbers, so they must never change.

/// Sent on the room-join socket when `_onJoin` rejects the client.
pub const JOIN_ERROR: u16 = 11;

/// WebSocket close code used when a join fails at the protocol level.
pub const WS_CLOSE_WITH_ERROR: u16 = 4002;

/// No handler is registered for the requested room type.
pub const ERR_MATCHMAKE_NO_HANDLER: u16 = 4210;

/// No existing room satisfied the matchmaking criteria.
pub const ERR_MATCHMAKE_INVALID_CRITERIA: u16 = 4211;

/// The room id is unknown, or the room is locked.
pub const ERR_MATCHMAKE_INVALID_ROOM_ID: u16 = 4212;

/// The matchmaking method is not exposed, or user code failed.
pub const ERR_MATCHMAKE_UNHANDLED: u16 = 4213;

/// The seat reservation for the presented session id has expired.
pub const ERR_MATCHMAKE_EXPIRED: u16 = 4214;

/// IPC reply code: the remote call succeeded.
pub const IPC_SUCCESS: u8 = 0;

/// IPC reply code: the remote call failed; the payload is a message.
pub const IPC_ERROR: u8 = 1;
