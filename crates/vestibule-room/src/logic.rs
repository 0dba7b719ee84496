//! The `RoomLogic` trait — the seam where authored game code plugs in.
//!
//! The framework calls these hooks at the right time from inside the
//! room actor; the developer writes game rules. Hooks are synchronous
//! state-machine calls; remote callers always await the actor's reply,
//! so cross-process semantics are unchanged.

use serde_json::Value;
use tokio::sync::mpsc;
use vestibule_protocol::SessionId;

use crate::{RoomError, RoomSetup};

/// A connected client as seen by room logic.
///
/// Cheap to clone; logic that wants to broadcast keeps its own roster
/// of these. Messages are dropped silently once the client is gone.
#[derive(Debug, Clone)]
pub struct ClientRef {
    session_id: SessionId,
    sender: mpsc::UnboundedSender<Value>,
}

impl ClientRef {
    pub fn new(session_id: SessionId, sender: mpsc::UnboundedSender<Value>) -> Self {
        Self { session_id, sender }
    }

    /// Creates a client together with the receiving end of its outbound
    /// channel. The transport (or a test) drains the receiver.
    pub fn channel(session_id: SessionId) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(session_id, tx), rx)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Queues a message for delivery. Returns `false` if the client's
    /// connection is gone.
    pub fn send(&self, message: Value) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Authored room behavior.
///
/// Every hook has a default, so a minimal room type is an empty struct.
/// The `property`/`call` pair is the room's remote-call table: names not
/// covered by the built-in members (`roomId`, `clients`, `_reserveSeat`,
/// `lock`, …) are resolved here, and unknown names surface as
/// remote-call errors.
pub trait RoomLogic: Send + 'static {
    /// Runs once while the room is in `Creating` state. May adjust the
    /// per-room setup (capacity, privacy, listing metadata). An error
    /// aborts the creation and reaches the client as an unhandled error.
    fn on_create(&mut self, _setup: &mut RoomSetup, _options: &Value) -> Result<(), RoomError> {
        Ok(())
    }

    /// Runs when a client with a reserved seat connects. An error
    /// rejects the join and frees the seat.
    fn on_join(&mut self, _client: &ClientRef, _options: &Value) -> Result<(), RoomError> {
        Ok(())
    }

    /// Runs for every data frame a connected client sends.
    fn on_message(&mut self, _session_id: &SessionId, _message: Value) {}

    /// Runs when a connected client leaves or is disconnected.
    fn on_leave(&mut self, _session_id: &SessionId) {}

    /// Runs once, right before the room's actor stops.
    fn on_dispose(&mut self) {}

    /// Resolves a readable attribute for remote property access.
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Invokes a user method for a remote call.
    fn call(&mut self, method: &str, _args: &[Value]) -> Result<Value, RoomError> {
        Err(RoomError::UnknownMethod(method.to_string()))
    }
}

/// The no-op room: every hook defaulted. Useful for tests and for room
/// types whose behavior is entirely matchmaking-driven.
#[derive(Debug, Default)]
pub struct NoopRoom;

impl RoomLogic for NoopRoom {}
