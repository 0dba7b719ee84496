//! The matchmaker: room selection, creation, seat reservation, and the
//! bookkeeping that keeps the fleet-wide registry honest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use vestibule_presence::{Presence, Subscription};
use vestibule_protocol::{channels, merge_options, ProcessId, RoomCall, RoomCallReply, RoomId, SessionId};
use vestibule_registry::{Driver, QueryConditions, RoomListing};
use vestibule_room::{spawn_room, RoomEvent, RoomHandle};

use crate::registration::LifecycleHooks;
use crate::remote::{call_via_presence, dispatch_local, remote_call_timeout};
use crate::{MatchmakeError, RemoteCallError, RoomType};

/// How many times `join_or_create` and `join` retry after losing a seat
/// race. Only `SeatReservation` failures retry.
pub const MAX_SEAT_RESERVATION_ATTEMPTS: u32 = 5;

/// Stagger step of the admission gate.
const ADMISSION_STEP: Duration = Duration::from_millis(100);

/// Upper bound of the admission stagger.
const ADMISSION_CAP: Duration = Duration::from_millis(2000);

/// The successful outcome of a matchmaking operation: the room's listing
/// and the fresh session id whose seat is reserved.
///
/// Serialized as `{ "room": { … }, "sessionId": "…" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatReservation {
    pub room: RoomListing,
    pub session_id: SessionId,
}

/// A locally hosted room: its handle plus the reference task that keeps
/// the registry and presence in sync with the actor's events.
struct LocalRoom {
    handle: RoomHandle,
    references: JoinHandle<()>,
}

/// The matchmaking core of one server process.
///
/// Generic over the [`Presence`] and registry [`Driver`] backends; every
/// process in a fleet points both at the same shared services.
pub struct Matchmaker<P: Presence, D: Driver> {
    process_id: ProcessId,
    presence: Arc<P>,
    driver: Arc<D>,
    handlers: Mutex<HashMap<String, RoomType>>,
    local_rooms: Arc<Mutex<HashMap<RoomId, LocalRoom>>>,
    shutting_down: AtomicBool,
}

impl<P: Presence, D: Driver> Matchmaker<P, D> {
    pub fn new(presence: Arc<P>, driver: Arc<D>) -> Self {
        let process_id = ProcessId::generate();
        tracing::info!(%process_id, "matchmaker started");
        Self {
            process_id,
            presence,
            driver,
            handlers: Mutex::new(HashMap::new()),
            local_rooms: Arc::new(Mutex::new(HashMap::new())),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    /// Registers (or replaces) the handler for a room type and reaps
    /// stale listings left behind by ungraceful shutdowns.
    pub async fn define(&self, name: &str, room_type: RoomType) -> Result<(), MatchmakeError> {
        let replaced = self
            .handlers
            .lock()
            .await
            .insert(name.to_string(), room_type)
            .is_some();
        if replaced {
            tracing::info!(name, "room handler replaced");
        } else {
            tracing::info!(name, "room handler registered");
        }
        self.clean_stale_rooms(name).await
    }

    /// Routes a transport matchmake request. Only the exposed methods
    /// pass; anything else is rejected as unhandled.
    pub async fn invoke(
        &self,
        method: &str,
        name: &str,
        options: Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        match method {
            "joinOrCreate" => self.join_or_create(name, options).await,
            "create" => self.create(name, options).await,
            "join" => self.join(name, options).await,
            "joinById" => self.join_by_id(&RoomId::new(name), options).await,
            other => Err(MatchmakeError::Unhandled(format!(
                "unhandled matchmaking method '{other}'"
            ))),
        }
    }

    /// Joins a suitable room, creating one when none qualifies.
    pub async fn join_or_create(
        &self,
        name: &str,
        options: Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        self.ensure_accepting()?;
        let mut attempt = 1;
        loop {
            let result = self
                .await_room_available(name, async {
                    let listing = match self.find_room(name, &options).await? {
                        Some(listing) => listing,
                        None => self.create_room(name, options.clone()).await?,
                    };
                    self.reserve_seat_for(&listing, &options).await
                })
                .await;

            match result {
                Err(MatchmakeError::SeatReservation(room_id))
                    if attempt < MAX_SEAT_RESERVATION_ATTEMPTS =>
                {
                    tracing::debug!(%room_id, name, attempt, "seat race lost, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Unconditionally creates a new room and reserves a seat in it.
    pub async fn create(
        &self,
        name: &str,
        options: Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        self.ensure_accepting()?;
        let listing = self.create_room(name, options.clone()).await?;
        self.reserve_seat_for(&listing, &options).await
    }

    /// Joins an existing room; never creates one.
    pub async fn join(
        &self,
        name: &str,
        options: Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        self.ensure_accepting()?;
        let mut attempt = 1;
        loop {
            let result = self
                .await_room_available(name, async {
                    let listing = self
                        .find_room(name, &options)
                        .await?
                        .ok_or_else(|| MatchmakeError::InvalidCriteria(name.to_string()))?;
                    self.reserve_seat_for(&listing, &options).await
                })
                .await;

            match result {
                Err(MatchmakeError::SeatReservation(room_id))
                    if attempt < MAX_SEAT_RESERVATION_ATTEMPTS =>
                {
                    tracing::debug!(%room_id, name, attempt, "seat race lost, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Joins a specific room by id.
    ///
    /// With `options.sessionId` set this is a rejoin: the seat must
    /// still be reserved on the owning room. Without one, the room must
    /// be unlocked and a fresh seat is reserved.
    pub async fn join_by_id(
        &self,
        room_id: &RoomId,
        options: Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        self.ensure_accepting()?;
        let listing = self
            .driver
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| MatchmakeError::InvalidRoomId(room_id.clone()))?;

        if let Some(session_id) = options.get("sessionId").and_then(Value::as_str) {
            let session_id = SessionId::new(session_id);
            let (_, held) = self
                .remote_room_call(
                    room_id,
                    "hasReservedSeat",
                    Some(vec![json!(session_id)]),
                    None,
                )
                .await?;
            if held.as_bool() == Some(true) {
                Ok(SeatReservation {
                    room: listing,
                    session_id,
                })
            } else {
                Err(MatchmakeError::Expired(session_id))
            }
        } else if !listing.locked {
            self.reserve_seat_for(&listing, &options).await
        } else {
            Err(MatchmakeError::InvalidRoomId(room_id.clone()))
        }
    }

    /// Lists public rooms matching the conditions. Forces
    /// `private = false`; locked rooms are included.
    pub async fn query(
        &self,
        name: Option<&str>,
        mut conditions: QueryConditions,
    ) -> Result<Vec<RoomListing>, MatchmakeError> {
        conditions.insert("private", false);
        if let Some(name) = name {
            conditions.insert("name", name);
        }
        Ok(self.driver.find(&conditions).await?)
    }

    /// The number of matchmaking-eligible rooms of a type, fleet-wide.
    pub async fn room_count_for(&self, name: &str) -> Result<usize, MatchmakeError> {
        Ok(self.presence.smembers(name).await?.len())
    }

    /// The handle of a locally hosted room, if this process owns it.
    pub async fn local_room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.local_rooms
            .lock()
            .await
            .get(room_id)
            .map(|room| room.handle.clone())
    }

    /// Calls a method (or reads a property, when `args` is `None`) on a
    /// room anywhere in the fleet. Local rooms are invoked directly;
    /// remote rooms go through presence with the given timeout (default
    /// [`remote_call_timeout`]).
    pub async fn remote_room_call(
        &self,
        room_id: &RoomId,
        method: &str,
        args: Option<Vec<Value>>,
        timeout: Option<Duration>,
    ) -> Result<(ProcessId, Value), RemoteCallError> {
        if let Some(handle) = self.local_room(room_id).await {
            let value = dispatch_local(&handle, method, args).await?;
            return Ok((self.process_id.clone(), value));
        }
        let timeout = timeout.unwrap_or_else(remote_call_timeout);
        call_via_presence(self.presence.as_ref(), room_id, method, args, timeout).await
    }

    /// Disconnects every locally hosted room and waits for their
    /// cleanup. Idempotent guard: a second call is rejected.
    pub async fn gracefully_shutdown(&self) -> Result<(), MatchmakeError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(MatchmakeError::ShuttingDown);
        }

        let rooms: Vec<LocalRoom> = {
            let mut local_rooms = self.local_rooms.lock().await;
            local_rooms.drain().map(|(_, room)| room).collect()
        };
        tracing::info!(rooms = rooms.len(), "graceful shutdown: disconnecting rooms");

        join_all(rooms.iter().map(|room| room.handle.disconnect())).await;
        // Wait for the reference tasks so listings, sets, and channel
        // subscriptions are gone before we resolve.
        join_all(rooms.into_iter().map(|room| room.references)).await;

        tracing::info!("graceful shutdown complete");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Room selection
    // ---------------------------------------------------------------------

    /// Picks a matchmaking candidate: confirms the handler, builds the
    /// query from its filter projection, and takes the best unlocked
    /// listing under its sort spec.
    async fn find_room(
        &self,
        name: &str,
        options: &Value,
    ) -> Result<Option<RoomListing>, MatchmakeError> {
        let (conditions, sort) = {
            let handlers = self.handlers.lock().await;
            let room_type = handlers
                .get(name)
                .ok_or_else(|| MatchmakeError::NoHandler(name.to_string()))?;
            (
                room_type.matchmaking_conditions(name, options),
                room_type.sort.clone(),
            )
        };
        Ok(self.driver.find_one(&conditions, sort.as_ref()).await?)
    }

    /// The admission gate: staggers near-simultaneous matchmaking for
    /// one room type so later arrivals converge on the first arrival's
    /// room instead of racing it to create more.
    ///
    /// The counter stays elevated from the matchmaking query through
    /// room creation and seat reservation. A staggered arrival's query
    /// therefore observes the saved listing and reserved seat of the
    /// arrival ahead of it. The first arrival sees a concurrency of
    /// zero and proceeds immediately; later arrivals wait
    /// `min(concurrency × 100 ms, 2 s)`. The counter always comes back
    /// down, even when the operation fails.
    async fn await_room_available<T>(
        &self,
        name: &str,
        operation: impl std::future::Future<Output = Result<T, MatchmakeError>>,
    ) -> Result<T, MatchmakeError> {
        let key = channels::concurrency_key(name);
        let concurrency = self.presence.incr(&key).await? - 1;
        if concurrency > 0 {
            let wait = ADMISSION_STEP
                .saturating_mul(concurrency as u32)
                .min(ADMISSION_CAP);
            tracing::debug!(name, concurrency, ?wait, "staggering concurrent matchmaking");
            tokio::time::sleep(wait).await;
        }

        let result = operation.await;

        if let Err(e) = self.presence.decr(&key).await {
            tracing::warn!(name, error = %e, "failed to release admission counter");
        }
        result
    }

    // ---------------------------------------------------------------------
    // Seat reservation
    // ---------------------------------------------------------------------

    /// Reserves a seat on the listed room under a fresh session id.
    async fn reserve_seat_for(
        &self,
        listing: &RoomListing,
        options: &Value,
    ) -> Result<SeatReservation, MatchmakeError> {
        let session_id = SessionId::generate();
        let (_, reserved) = self
            .remote_room_call(
                &listing.room_id,
                "_reserveSeat",
                Some(vec![json!(session_id), options.clone()]),
                None,
            )
            .await?;

        if reserved.as_bool() == Some(true) {
            tracing::debug!(room_id = %listing.room_id, %session_id, "seat reserved");
            Ok(SeatReservation {
                room: listing.clone(),
                session_id,
            })
        } else {
            Err(MatchmakeError::SeatReservation(listing.room_id.clone()))
        }
    }

    // ---------------------------------------------------------------------
    // Room creation
    // ---------------------------------------------------------------------

    /// Creates a room of the given type and publishes its listing.
    async fn create_room(
        &self,
        name: &str,
        client_options: Value,
    ) -> Result<RoomListing, MatchmakeError> {
        let (logic, options, merged_options, metadata, hooks) = {
            let handlers = self.handlers.lock().await;
            let room_type = handlers
                .get(name)
                .ok_or_else(|| MatchmakeError::NoHandler(name.to_string()))?;
            (
                room_type.instantiate(),
                room_type.options.clone(),
                merge_options(&room_type.default_options, &client_options),
                room_type.project_metadata(&client_options),
                room_type.hooks.clone(),
            )
        };

        let room_id = RoomId::generate();
        let mut listing = self
            .driver
            .create_instance(RoomListing::new(
                room_id.clone(),
                name,
                self.process_id.clone(),
            ))
            .await?;
        listing.metadata = metadata;

        let spawned = spawn_room(
            room_id.clone(),
            name,
            self.process_id.clone(),
            options,
            merged_options,
            logic,
        );
        let setup = spawned
            .created
            .await
            .map_err(|_| MatchmakeError::Unhandled("room creation aborted".into()))?
            .map_err(|e| MatchmakeError::Unhandled(e.to_string()))?;

        listing.max_clients = setup.max_clients;
        listing.private = setup.private;
        for (key, value) in setup.metadata {
            listing.metadata.insert(key, value);
        }

        self.create_room_references(
            spawned.handle,
            listing.clone(),
            spawned.events,
            hooks.clone(),
        )
        .await?;
        self.driver.save(&listing).await?;
        hooks.create(&listing);
        tracing::info!(%room_id, name, "room created");
        Ok(listing)
    }

    /// Wires a freshly created room into the process: stores the handle,
    /// adds the room to its type's eligibility set, subscribes the RPC
    /// channel, and spawns the reference task.
    async fn create_room_references(
        &self,
        handle: RoomHandle,
        listing: RoomListing,
        events: mpsc::UnboundedReceiver<RoomEvent>,
        hooks: Arc<LifecycleHooks>,
    ) -> Result<(), MatchmakeError> {
        let room_id = listing.room_id.clone();
        self.presence
            .sadd(&listing.name, room_id.as_str())
            .await?;
        let subscription = self
            .presence
            .subscribe(&channels::room_channel(&room_id))
            .await?;

        let references =
            self.spawn_room_references(handle.clone(), listing, events, subscription, hooks);
        self.local_rooms
            .lock()
            .await
            .insert(room_id, LocalRoom { handle, references });
        Ok(())
    }

    /// The per-room reference task. Serves inbound remote calls and
    /// mirrors the actor's lifecycle events into the registry, presence
    /// set, and hook slots. On dispose it erases every trace of the
    /// room.
    fn spawn_room_references(
        &self,
        handle: RoomHandle,
        mut listing: RoomListing,
        mut events: mpsc::UnboundedReceiver<RoomEvent>,
        mut rpc: Subscription,
        hooks: Arc<LifecycleHooks>,
    ) -> JoinHandle<()> {
        let presence = Arc::clone(&self.presence);
        let driver = Arc::clone(&self.driver);
        let process_id = self.process_id.clone();
        let local_rooms = Arc::clone(&self.local_rooms);

        tokio::spawn(async move {
            let mut rpc_open = true;
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(RoomEvent::Lock) => {
                            listing.locked = true;
                            let _ = presence.srem(&listing.name, listing.room_id.as_str()).await;
                            save_listing(driver.as_ref(), &listing).await;
                            hooks.lock(&listing);
                        }
                        Some(RoomEvent::Unlock) => {
                            listing.locked = false;
                            let _ = presence.sadd(&listing.name, listing.room_id.as_str()).await;
                            save_listing(driver.as_ref(), &listing).await;
                            hooks.unlock(&listing);
                        }
                        Some(RoomEvent::Join { occupancy, .. }) => {
                            listing.clients = occupancy;
                            save_listing(driver.as_ref(), &listing).await;
                            hooks.join(&listing);
                        }
                        Some(RoomEvent::Leave { occupancy, .. }) => {
                            listing.clients = occupancy;
                            save_listing(driver.as_ref(), &listing).await;
                            hooks.leave(&listing);
                        }
                        Some(RoomEvent::Clients { occupancy }) => {
                            listing.clients = occupancy;
                            save_listing(driver.as_ref(), &listing).await;
                        }
                        Some(RoomEvent::Disconnect) => {
                            tracing::debug!(room_id = %listing.room_id, "room disconnecting");
                        }
                        Some(RoomEvent::Dispose) | None => break,
                    },
                    message = rpc.recv(), if rpc_open => match message {
                        Some(message) => {
                            serve_room_call(&handle, presence.as_ref(), &process_id, &message).await;
                        }
                        None => rpc_open = false,
                    },
                }
            }

            // Dispose: remove the listing, clear set membership, drop the
            // admission counter for the type, and forget the handle. The
            // RPC subscription drops with this task.
            let _ = driver.remove(&listing.room_id).await;
            let _ = presence.srem(&listing.name, listing.room_id.as_str()).await;
            let _ = presence
                .del(&channels::concurrency_key(&listing.name))
                .await;
            local_rooms.lock().await.remove(&listing.room_id);
            hooks.dispose(&listing);
            tracing::info!(room_id = %listing.room_id, "room references cleared");
        })
    }

    // ---------------------------------------------------------------------
    // Stale room cleanup
    // ---------------------------------------------------------------------

    /// Probes every listing of a type and reaps the ones whose owner no
    /// longer answers. A remote-call timeout is the staleness signal and
    /// is swallowed; a remote error means the owner is alive. Idempotent
    /// on a clean registry.
    async fn clean_stale_rooms(&self, name: &str) -> Result<(), MatchmakeError> {
        let listings = self
            .driver
            .find(&QueryConditions::new().with("name", name))
            .await?;

        for listing in listings {
            match self
                .remote_room_call(&listing.room_id, "roomId", None, None)
                .await
            {
                Ok(_) => {}
                Err(RemoteCallError::Timeout { .. }) => {
                    tracing::warn!(
                        room_id = %listing.room_id,
                        name,
                        "owner not responding, removing stale room"
                    );
                    self.driver.remove(&listing.room_id).await?;
                    let _ = self
                        .presence
                        .srem(name, listing.room_id.as_str())
                        .await;
                }
                Err(RemoteCallError::Remote(message)) => {
                    tracing::debug!(
                        room_id = %listing.room_id,
                        %message,
                        "stale probe errored, owner is alive"
                    );
                }
                Err(e @ RemoteCallError::Presence(_)) => return Err(e.into()),
            }
        }

        // Do not carry stale concurrency into the new registration.
        self.presence
            .del(&channels::concurrency_key(name))
            .await?;
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<(), MatchmakeError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            Err(MatchmakeError::ShuttingDown)
        } else {
            Ok(())
        }
    }
}

/// Answers one inbound `[method, requestId, args]` frame on a room's RPC
/// channel, packaging errors as `[IPC_ERROR, message]` replies.
async fn serve_room_call<P: Presence>(
    handle: &RoomHandle,
    presence: &P,
    process_id: &ProcessId,
    message: &Value,
) {
    let call = match RoomCall::from_value(message) {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!(room_id = %handle.room_id(), error = %e, "dropping malformed room call");
            return;
        }
    };

    let reply = match dispatch_local(handle, &call.method, call.args).await {
        Ok(value) => RoomCallReply::success(process_id.clone(), value),
        Err(e) => RoomCallReply::error(e.to_string()),
    };

    let channel = channels::reply_channel(handle.room_id(), &call.request_id);
    if let Err(e) = presence.publish(&channel, reply.to_value()).await {
        tracing::warn!(room_id = %handle.room_id(), error = %e, "failed to publish room call reply");
    }
}

async fn save_listing<D: Driver>(driver: &D, listing: &RoomListing) {
    if let Err(e) = driver.save(listing).await {
        tracing::warn!(room_id = %listing.room_id, error = %e, "failed to save listing");
    }
}
