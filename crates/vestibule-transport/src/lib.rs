//! WebSocket transport adapter for Vestibule.
//!
//! Exposes the two client-facing paths of the matchmaking core:
//!
//! - **Matchmake**, `/<…>/matchmake/<method>/<name>`: the first frame
//!   is the JSON request body; the reply is the seat reservation or a
//!   `{code, error}` body. One request per socket.
//! - **Room join**, `/<name>/<roomId>?sessionId=<id>`: claims the
//!   reserved seat on the locally hosted room and stays open as the
//!   client's connection.
//!
//! Per-message compression stays disabled: the deflate extension is
//! never negotiated.

mod error;
mod route;
mod ws;

pub use error::TransportError;
pub use route::Route;
pub use ws::{TransportConfig, WsTransport};
