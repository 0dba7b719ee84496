//! Room actor: an isolated Tokio task that owns one live room.
//!
//! Each room runs in its own task, communicating with the rest of the
//! process through an mpsc command channel. The actor owns the seat
//! reservation table and the connected-client map, sweeps expired
//! reservations on an interval, and reports every externally visible
//! change on a typed event stream the matchmaker consumes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use vestibule_protocol::{ProcessId, RoomId, SessionId};

use crate::{ClientRef, RoomError, RoomLogic, RoomOptions, RoomSetup, RoomState};

/// Command channel size per room actor.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Typed lifecycle events the actor emits for the matchmaker.
///
/// `occupancy` is connected clients plus live reservations — the value
/// the fleet-wide listing reports as `clients`.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Lock,
    Unlock,
    Join { session_id: SessionId, occupancy: u32 },
    Leave { session_id: SessionId, occupancy: u32 },
    Clients { occupancy: u32 },
    Disconnect,
    Dispose,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    ReserveSeat {
        session_id: SessionId,
        options: Value,
        reply: oneshot::Sender<bool>,
    },
    HasReservedSeat {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    ClientJoin {
        client: ClientRef,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    ClientLeave {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    ClientMessage {
        session_id: SessionId,
        message: Value,
    },
    Lock {
        reply: oneshot::Sender<()>,
    },
    Unlock {
        reply: oneshot::Sender<()>,
    },
    Property {
        name: String,
        reply: oneshot::Sender<Option<Value>>,
    },
    Call {
        method: String,
        args: Vec<Value>,
        reply: oneshot::Sender<Result<Value, RoomError>>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub process_id: ProcessId,
    pub state: RoomState,
    pub connected: u32,
    pub reserved: u32,
    pub locked: bool,
    pub max_clients: u32,
}

impl RoomInfo {
    pub fn occupancy(&self) -> u32 {
        self.connected + self.reserved
    }
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    async fn request<T>(
        &self,
        command: RoomCommand,
        reply: oneshot::Receiver<T>,
    ) -> Result<T, RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Reserves a seat for a session. Returns `false` when the room is
    /// locked, full, or no longer accepting. Idempotent per session id —
    /// re-reserving refreshes the expiry of the same seat.
    pub async fn reserve_seat(
        &self,
        session_id: SessionId,
        options: Value,
    ) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            RoomCommand::ReserveSeat {
                session_id,
                options,
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Returns `true` if the session holds an unexpired reservation.
    pub async fn has_reserved_seat(&self, session_id: &SessionId) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            RoomCommand::HasReservedSeat {
                session_id: session_id.clone(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Claims the reserved seat for the client's session and runs the
    /// user `on_join` hook.
    pub async fn client_join(&self, client: ClientRef) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(RoomCommand::ClientJoin { client, reply: tx }, rx)
            .await?
    }

    /// Removes a connected client. Returns whether it was present.
    pub async fn client_leave(&self, session_id: &SessionId) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            RoomCommand::ClientLeave {
                session_id: session_id.clone(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Forwards a data frame from a connected client to the room logic.
    /// Fire-and-forget.
    pub async fn client_message(
        &self,
        session_id: &SessionId,
        message: Value,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::ClientMessage {
                session_id: session_id.clone(),
                message,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Locks the room explicitly. It stays locked until `unlock`.
    pub async fn lock(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(RoomCommand::Lock { reply: tx }, rx).await
    }

    /// Unlocks the room, clearing an explicit lock.
    pub async fn unlock(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(RoomCommand::Unlock { reply: tx }, rx).await
    }

    /// Reads a room attribute: built-in members first, then the logic's
    /// property table.
    pub async fn property(&self, name: &str) -> Result<Option<Value>, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            RoomCommand::Property {
                name: name.to_string(),
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Invokes a user method from the logic's call table.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            RoomCommand::Call {
                method: method.to_string(),
                args,
                reply: tx,
            },
            rx,
        )
        .await?
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(RoomCommand::Info { reply: tx }, rx).await
    }

    /// Boots every client and disposes the room. Resolves once the
    /// Disconnecting → Disposed transition has completed.
    pub async fn disconnect(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.request(RoomCommand::Disconnect { reply: tx }, rx).await
    }
}

/// A reserved seat awaiting its client.
struct ReservedSeat {
    expires_at: Instant,
    options: Value,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    name: String,
    process_id: ProcessId,
    state: RoomState,
    max_clients: u32,
    private: bool,
    auto_dispose: bool,
    seat_reservation_ttl: Duration,
    locked: bool,
    locked_explicitly: bool,
    reservations: HashMap<SessionId, ReservedSeat>,
    clients: HashMap<SessionId, ClientRef>,
    /// Set while the room has zero occupancy; a room left empty for a
    /// full reservation TTL disposes itself.
    empty_since: Option<Instant>,
    logic: Box<dyn RoomLogic>,
    events: mpsc::UnboundedSender<RoomEvent>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(
        mut self,
        created: oneshot::Sender<Result<RoomSetup, RoomError>>,
        create_options: Value,
        sweep_interval: Duration,
    ) {
        let mut setup = RoomSetup {
            max_clients: self.max_clients,
            private: self.private,
            auto_dispose: self.auto_dispose,
            metadata: Default::default(),
        };
        if let Err(e) = self.logic.on_create(&mut setup, &create_options) {
            tracing::warn!(room_id = %self.room_id, error = %e, "on_create failed");
            self.transition(RoomState::Disposed);
            let _ = created.send(Err(e));
            return;
        }
        self.max_clients = setup.max_clients;
        self.private = setup.private;
        self.auto_dispose = setup.auto_dispose;
        self.transition(RoomState::Created);
        self.empty_since = Some(Instant::now());
        if created.send(Ok(setup)).is_err() {
            // Creator vanished before the room went live.
            self.dispose();
            return;
        }
        tracing::info!(room_id = %self.room_id, name = %self.name, "room created");

        let mut sweep = tokio::time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        sweep.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.dispose();
                        break;
                    }
                },
                _ = sweep.tick() => {
                    if self.sweep_reservations() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    /// Processes one command. Returns `true` when the actor should stop.
    fn handle_command(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::ReserveSeat {
                session_id,
                options,
                reply,
            } => {
                let reserved = self.reserve_seat(session_id, options);
                let _ = reply.send(reserved);
            }
            RoomCommand::HasReservedSeat { session_id, reply } => {
                let now = Instant::now();
                let held = self
                    .reservations
                    .get(&session_id)
                    .is_some_and(|seat| seat.expires_at > now);
                let _ = reply.send(held);
            }
            RoomCommand::ClientJoin { client, reply } => {
                let result = self.client_join(client);
                let _ = reply.send(result);
            }
            RoomCommand::ClientLeave { session_id, reply } => {
                let removed = self.clients.remove(&session_id).is_some();
                if removed {
                    self.logic.on_leave(&session_id);
                    let occupancy = self.occupancy();
                    tracing::info!(
                        room_id = %self.room_id,
                        %session_id,
                        occupancy,
                        "client left"
                    );
                    self.emit(RoomEvent::Leave {
                        session_id,
                        occupancy,
                    });
                    self.refresh_lock();
                    let _ = reply.send(true);
                    return self.dispose_if_empty();
                }
                let _ = reply.send(false);
            }
            RoomCommand::ClientMessage {
                session_id,
                message,
            } => {
                if self.clients.contains_key(&session_id) {
                    self.logic.on_message(&session_id, message);
                } else {
                    tracing::warn!(
                        room_id = %self.room_id,
                        %session_id,
                        "message from non-member, ignoring"
                    );
                }
            }
            RoomCommand::Lock { reply } => {
                self.lock_room(true);
                let _ = reply.send(());
            }
            RoomCommand::Unlock { reply } => {
                if self.locked {
                    self.locked = false;
                    self.locked_explicitly = false;
                    self.emit(RoomEvent::Unlock);
                }
                let _ = reply.send(());
            }
            RoomCommand::Property { name, reply } => {
                let value = self.property(&name);
                let _ = reply.send(value);
            }
            RoomCommand::Call {
                method,
                args,
                reply,
            } => {
                let result = self.logic.call(&method, &args);
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Disconnect { reply } => {
                self.transition(RoomState::Disconnecting);
                tracing::info!(room_id = %self.room_id, "room disconnecting");
                self.emit(RoomEvent::Disconnect);
                let sessions: Vec<SessionId> = self.clients.keys().cloned().collect();
                for session_id in sessions {
                    self.clients.remove(&session_id);
                    self.logic.on_leave(&session_id);
                }
                self.reservations.clear();
                self.dispose();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn reserve_seat(&mut self, session_id: SessionId, options: Value) -> bool {
        let expires_at = Instant::now() + self.seat_reservation_ttl;
        if let Some(seat) = self.reservations.get_mut(&session_id) {
            seat.expires_at = expires_at;
            return true;
        }
        if !self.state.is_accepting() || self.locked || self.occupancy() >= self.max_clients {
            return false;
        }
        self.reservations
            .insert(session_id.clone(), ReservedSeat { expires_at, options });
        self.empty_since = None;
        let occupancy = self.occupancy();
        tracing::debug!(room_id = %self.room_id, %session_id, occupancy, "seat reserved");
        self.emit(RoomEvent::Clients { occupancy });
        if occupancy >= self.max_clients {
            self.lock_room(false);
        }
        true
    }

    fn client_join(&mut self, client: ClientRef) -> Result<(), RoomError> {
        if !self.state.is_accepting() {
            return Err(RoomError::InvalidState(format!(
                "cannot join room in state {}",
                self.state
            )));
        }
        let session_id = client.session_id().clone();
        let seat = self
            .reservations
            .remove(&session_id)
            .ok_or_else(|| RoomError::NoReservation(session_id.clone()))?;
        if seat.expires_at <= Instant::now() {
            self.seat_freed();
            return Err(RoomError::SeatExpired(session_id));
        }
        if let Err(e) = self.logic.on_join(&client, &seat.options) {
            self.seat_freed();
            return Err(e);
        }
        self.clients.insert(session_id.clone(), client);
        let occupancy = self.occupancy();
        tracing::info!(room_id = %self.room_id, %session_id, occupancy, "client joined");
        self.emit(RoomEvent::Join {
            session_id,
            occupancy,
        });
        Ok(())
    }

    /// Removes expired reservations and disposes an abandoned room.
    /// Returns `true` when the actor should stop.
    fn sweep_reservations(&mut self) -> bool {
        let now = Instant::now();
        let before = self.reservations.len();
        self.reservations.retain(|session_id, seat| {
            let live = seat.expires_at > now;
            if !live {
                tracing::debug!(
                    room_id = %self.room_id,
                    %session_id,
                    "seat reservation expired"
                );
            }
            live
        });
        if self.reservations.len() != before {
            self.seat_freed();
            if self.occupancy() == 0 && self.auto_dispose && self.state.is_accepting() {
                self.dispose();
                return true;
            }
        }
        // A room nobody ever claimed disposes after one reservation TTL.
        if self.auto_dispose
            && self.state.is_accepting()
            && self
                .empty_since
                .is_some_and(|since| now.duration_since(since) >= self.seat_reservation_ttl)
        {
            tracing::info!(room_id = %self.room_id, "room left unclaimed, disposing");
            self.dispose();
            return true;
        }
        false
    }

    /// Occupancy dropped: republish the count and auto-unlock if the
    /// lock was not explicit.
    fn seat_freed(&mut self) {
        let occupancy = self.occupancy();
        if occupancy == 0 {
            self.empty_since = Some(Instant::now());
        }
        self.emit(RoomEvent::Clients { occupancy });
        self.refresh_lock();
    }

    fn dispose_if_empty(&mut self) -> bool {
        if self.occupancy() == 0 {
            self.empty_since = Some(Instant::now());
            if self.auto_dispose && self.state.is_accepting() {
                self.dispose();
                return true;
            }
        }
        false
    }

    fn dispose(&mut self) {
        if self.state == RoomState::Disposed {
            return;
        }
        self.logic.on_dispose();
        self.transition(RoomState::Disposed);
        self.emit(RoomEvent::Dispose);
        tracing::info!(room_id = %self.room_id, "room disposed");
    }

    fn lock_room(&mut self, explicit: bool) {
        if !self.locked {
            self.locked = true;
            tracing::debug!(room_id = %self.room_id, explicit, "room locked");
            self.emit(RoomEvent::Lock);
        }
        if explicit {
            self.locked_explicitly = true;
        }
    }

    /// Auto-unlocks when capacity frees, unless the lock was explicit.
    fn refresh_lock(&mut self) {
        if self.locked && !self.locked_explicitly && self.occupancy() < self.max_clients {
            self.locked = false;
            self.emit(RoomEvent::Unlock);
        }
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "roomId" => Some(json!(self.room_id)),
            "name" => Some(json!(self.name)),
            "processId" => Some(json!(self.process_id)),
            "maxClients" => Some(json!(self.max_clients)),
            "clients" => Some(json!(self.occupancy())),
            "locked" => Some(json!(self.locked)),
            "private" => Some(json!(self.private)),
            other => self.logic.property(other),
        }
    }

    fn occupancy(&self) -> u32 {
        (self.clients.len() + self.reservations.len()) as u32
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            process_id: self.process_id.clone(),
            state: self.state,
            connected: self.clients.len() as u32,
            reserved: self.reservations.len() as u32,
            locked: self.locked,
            max_clients: self.max_clients,
        }
    }

    fn transition(&mut self, next: RoomState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "room state must stay monotone: {} -> {next}",
            self.state
        );
        self.state = next;
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }
}

/// A freshly spawned room and the channels the owner wires up.
pub struct SpawnedRoom {
    pub handle: RoomHandle,
    /// Lifecycle events for the matchmaker's reference task.
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
    /// Resolves once `on_create` has run, with the final setup.
    pub created: oneshot::Receiver<Result<RoomSetup, RoomError>>,
}

/// Spawns a new room actor task.
///
/// The actor runs `on_create` first and reports the outcome on
/// `created`; a failed creation stops the actor without emitting any
/// lifecycle event.
pub fn spawn_room(
    room_id: RoomId,
    name: impl Into<String>,
    process_id: ProcessId,
    options: RoomOptions,
    create_options: Value,
    logic: Box<dyn RoomLogic>,
) -> SpawnedRoom {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (created_tx, created_rx) = oneshot::channel();

    let actor = RoomActor {
        room_id: room_id.clone(),
        name: name.into(),
        process_id,
        state: RoomState::Creating,
        max_clients: options.max_clients,
        private: options.private,
        auto_dispose: options.auto_dispose,
        seat_reservation_ttl: options.seat_reservation_ttl,
        locked: false,
        locked_explicitly: false,
        reservations: HashMap::new(),
        clients: HashMap::new(),
        empty_since: None,
        logic,
        events: event_tx,
        receiver: command_rx,
    };
    let sweep_interval = options.reservation_sweep_interval;
    tokio::spawn(actor.run(created_tx, create_options, sweep_interval));

    SpawnedRoom {
        handle: RoomHandle {
            room_id,
            sender: command_tx,
        },
        events: event_rx,
        created: created_rx,
    }
}
