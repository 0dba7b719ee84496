//! Integration tests for the room actor using mock room logic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use vestibule_protocol::{ProcessId, RoomId, SessionId};
use vestibule_room::{
    spawn_room, ClientRef, NoopRoom, RoomError, RoomEvent, RoomHandle, RoomLogic, RoomOptions,
    RoomSetup, RoomState, SpawnedRoom,
};

// =========================================================================
// Mock logic
// =========================================================================

/// Counts hook invocations and exposes a `score` property and a `bump`
/// method through the remote-call tables.
#[derive(Default)]
struct CountingRoom {
    joins: Arc<AtomicU32>,
    leaves: Arc<AtomicU32>,
    disposed: Arc<AtomicU32>,
    score: u32,
}

impl RoomLogic for CountingRoom {
    fn on_join(&mut self, _client: &ClientRef, _options: &Value) -> Result<(), RoomError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_leave(&mut self, _session_id: &SessionId) {
        self.leaves.fetch_add(1, Ordering::SeqCst);
    }

    fn on_dispose(&mut self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "score" => Some(json!(self.score)),
            _ => None,
        }
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value, RoomError> {
        match method {
            "bump" => {
                let by = args.first().and_then(Value::as_u64).unwrap_or(1) as u32;
                self.score += by;
                Ok(json!(self.score))
            }
            other => Err(RoomError::UnknownMethod(other.to_string())),
        }
    }
}

/// Rejects every join.
struct BouncerRoom;

impl RoomLogic for BouncerRoom {
    fn on_join(&mut self, _client: &ClientRef, _options: &Value) -> Result<(), RoomError> {
        Err(RoomError::rejected("not on the list"))
    }
}

/// Fails creation.
struct BrokenRoom;

impl RoomLogic for BrokenRoom {
    fn on_create(&mut self, _setup: &mut RoomSetup, _options: &Value) -> Result<(), RoomError> {
        Err(RoomError::rejected("bad config"))
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn sid(id: &str) -> SessionId {
    SessionId::new(id)
}

fn options(max_clients: u32) -> RoomOptions {
    RoomOptions {
        max_clients,
        auto_dispose: false,
        ..RoomOptions::default()
    }
}

fn spawn(logic: impl RoomLogic, opts: RoomOptions) -> SpawnedRoom {
    spawn_room(
        RoomId::generate(),
        "battle",
        ProcessId::generate(),
        opts,
        json!({}),
        Box::new(logic),
    )
}

async fn created(spawned: SpawnedRoom) -> (RoomHandle, mpsc::UnboundedReceiver<RoomEvent>) {
    spawned
        .created
        .await
        .expect("actor alive")
        .expect("creation should succeed");
    (spawned.handle, spawned.events)
}

async fn join(handle: &RoomHandle, session: &str) -> Result<(), RoomError> {
    let (client, _rx) = ClientRef::channel(sid(session));
    handle.client_join(client).await
}

// =========================================================================
// Creation
// =========================================================================

#[tokio::test]
async fn test_on_create_failure_reports_error_and_stops_actor() {
    let spawned = spawn(BrokenRoom, options(4));

    let result = spawned.created.await.expect("actor alive");
    assert!(matches!(result, Err(RoomError::Rejected(_))));

    // The actor is gone; commands fail with Unavailable.
    let err = spawned.handle.info().await.unwrap_err();
    assert!(matches!(err, RoomError::Unavailable(_)));
}

#[tokio::test]
async fn test_created_room_is_accepting() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;

    let info = handle.info().await.unwrap();
    assert_eq!(info.state, RoomState::Created);
    assert_eq!(info.occupancy(), 0);
    assert!(!info.locked);
}

// =========================================================================
// Seat reservations
// =========================================================================

#[tokio::test]
async fn test_reserve_seat_succeeds_until_full() {
    let (handle, _events) = created(spawn(NoopRoom, options(2))).await;

    assert!(handle.reserve_seat(sid("a"), json!({})).await.unwrap());
    assert!(handle.reserve_seat(sid("b"), json!({})).await.unwrap());
    // Full now — and auto-locked, so a third seat is refused.
    assert!(!handle.reserve_seat(sid("c"), json!({})).await.unwrap());

    let info = handle.info().await.unwrap();
    assert_eq!(info.reserved, 2);
    assert!(info.locked);
}

#[tokio::test]
async fn test_reserve_seat_is_idempotent_per_session() {
    let (handle, _events) = created(spawn(NoopRoom, options(2))).await;

    assert!(handle.reserve_seat(sid("a"), json!({})).await.unwrap());
    assert!(handle.reserve_seat(sid("a"), json!({})).await.unwrap());

    let info = handle.info().await.unwrap();
    assert_eq!(info.reserved, 1);
}

#[tokio::test]
async fn test_reserve_seat_refused_when_locked() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;

    handle.lock().await.unwrap();
    assert!(!handle.reserve_seat(sid("a"), json!({})).await.unwrap());
}

#[tokio::test]
async fn test_has_reserved_seat() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;

    assert!(!handle.has_reserved_seat(&sid("a")).await.unwrap());
    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    assert!(handle.has_reserved_seat(&sid("a")).await.unwrap());
}

#[tokio::test]
async fn test_expired_reservation_is_swept_and_frees_capacity() {
    let opts = RoomOptions {
        max_clients: 1,
        auto_dispose: false,
        seat_reservation_ttl: Duration::from_millis(30),
        reservation_sweep_interval: Duration::from_millis(10),
        ..RoomOptions::default()
    };
    let (handle, _events) = created(spawn(NoopRoom, opts)).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    // Capacity 1 → the reservation locked the room.
    assert!(handle.info().await.unwrap().locked);

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!handle.has_reserved_seat(&sid("a")).await.unwrap());
    let info = handle.info().await.unwrap();
    assert_eq!(info.reserved, 0);
    // The auto-lock released with the freed seat.
    assert!(!info.locked);
}

// =========================================================================
// Joins and leaves
// =========================================================================

#[tokio::test]
async fn test_client_join_claims_reservation() {
    let counting = CountingRoom::default();
    let joins = counting.joins.clone();
    let (handle, _events) = created(spawn(counting, options(4))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    join(&handle, "a").await.unwrap();

    let info = handle.info().await.unwrap();
    assert_eq!(info.connected, 1);
    assert_eq!(info.reserved, 0);
    assert_eq!(joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_join_without_reservation_fails() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;

    let err = join(&handle, "ghost").await.unwrap_err();
    assert!(matches!(err, RoomError::NoReservation(_)));
}

#[tokio::test]
async fn test_client_join_rejected_by_logic_frees_seat() {
    let (handle, _events) = created(spawn(BouncerRoom, options(4))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    let err = join(&handle, "a").await.unwrap_err();
    assert!(matches!(err, RoomError::Rejected(_)));

    let info = handle.info().await.unwrap();
    assert_eq!(info.reserved, 0);
    assert_eq!(info.connected, 0);
}

#[tokio::test]
async fn test_client_leave_runs_hook_and_unlocks() {
    let counting = CountingRoom::default();
    let leaves = counting.leaves.clone();
    let (handle, _events) = created(spawn(counting, options(1))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    join(&handle, "a").await.unwrap();
    assert!(handle.info().await.unwrap().locked);

    assert!(handle.client_leave(&sid("a")).await.unwrap());

    assert_eq!(leaves.load(Ordering::SeqCst), 1);
    let info = handle.info().await.unwrap();
    assert_eq!(info.connected, 0);
    assert!(!info.locked);
}

#[tokio::test]
async fn test_client_leave_unknown_session_returns_false() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;
    assert!(!handle.client_leave(&sid("nobody")).await.unwrap());
}

#[tokio::test]
async fn test_auto_dispose_when_last_client_leaves() {
    let opts = RoomOptions {
        max_clients: 4,
        auto_dispose: true,
        ..RoomOptions::default()
    };
    let counting = CountingRoom::default();
    let disposed = counting.disposed.clone();
    let (handle, mut events) = created(spawn(counting, opts)).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    join(&handle, "a").await.unwrap();
    handle.client_leave(&sid("a")).await.unwrap();

    // Actor stops after dispose.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(
        handle.info().await.unwrap_err(),
        RoomError::Unavailable(_)
    ));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    let mut saw_dispose = false;
    while let Some(event) = events.recv().await {
        if event == RoomEvent::Dispose {
            saw_dispose = true;
        }
    }
    assert!(saw_dispose);
}

// =========================================================================
// Lock / unlock
// =========================================================================

#[tokio::test]
async fn test_explicit_lock_survives_freed_capacity() {
    let (handle, _events) = created(spawn(NoopRoom, options(2))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    handle.lock().await.unwrap();
    join(&handle, "a").await.unwrap();
    handle.client_leave(&sid("a")).await.unwrap();

    // Capacity freed, but the lock was explicit.
    assert!(handle.info().await.unwrap().locked);

    handle.unlock().await.unwrap();
    assert!(!handle.info().await.unwrap().locked);
}

#[tokio::test]
async fn test_lock_and_unlock_emit_events() {
    let (handle, mut events) = created(spawn(NoopRoom, options(4))).await;

    handle.lock().await.unwrap();
    handle.unlock().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&RoomEvent::Lock));
    assert!(seen.contains(&RoomEvent::Unlock));
}

// =========================================================================
// Remote-call tables
// =========================================================================

#[tokio::test]
async fn test_builtin_properties() {
    let (handle, _events) = created(spawn(NoopRoom, options(4))).await;

    assert_eq!(
        handle.property("roomId").await.unwrap(),
        Some(json!(handle.room_id()))
    );
    assert_eq!(handle.property("maxClients").await.unwrap(), Some(json!(4)));
    assert_eq!(handle.property("locked").await.unwrap(), Some(json!(false)));
    assert_eq!(handle.property("clients").await.unwrap(), Some(json!(0)));
}

#[tokio::test]
async fn test_logic_property_and_call() {
    let (handle, _events) = created(spawn(CountingRoom::default(), options(4))).await;

    assert_eq!(handle.property("score").await.unwrap(), Some(json!(0)));
    assert_eq!(handle.call("bump", vec![json!(5)]).await.unwrap(), json!(5));
    assert_eq!(handle.property("score").await.unwrap(), Some(json!(5)));
}

#[tokio::test]
async fn test_unknown_property_and_method() {
    let (handle, _events) = created(spawn(CountingRoom::default(), options(4))).await;

    assert_eq!(handle.property("nonsense").await.unwrap(), None);
    assert!(matches!(
        handle.call("nonsense", vec![]).await.unwrap_err(),
        RoomError::UnknownMethod(_)
    ));
}

// =========================================================================
// Messages
// =========================================================================

#[tokio::test]
async fn test_client_message_reaches_logic_only_for_members() {
    struct EchoRoom {
        received: Arc<AtomicU32>,
    }
    impl RoomLogic for EchoRoom {
        fn on_message(&mut self, _session_id: &SessionId, _message: Value) {
            self.received.fetch_add(1, Ordering::SeqCst);
        }
    }

    let received = Arc::new(AtomicU32::new(0));
    let logic = EchoRoom {
        received: received.clone(),
    };
    let (handle, _events) = created(spawn(logic, options(4))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    join(&handle, "a").await.unwrap();

    handle.client_message(&sid("a"), json!("hi")).await.unwrap();
    handle
        .client_message(&sid("stranger"), json!("hi"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(received.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_boots_clients_and_disposes() {
    let counting = CountingRoom::default();
    let leaves = counting.leaves.clone();
    let disposed = counting.disposed.clone();
    let (handle, mut events) = created(spawn(counting, options(4))).await;

    handle.reserve_seat(sid("a"), json!({})).await.unwrap();
    handle.reserve_seat(sid("b"), json!({})).await.unwrap();
    join(&handle, "a").await.unwrap();
    join(&handle, "b").await.unwrap();

    handle.disconnect().await.unwrap();

    assert_eq!(leaves.load(Ordering::SeqCst), 2);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    let mut saw_disconnect = false;
    let mut saw_dispose = false;
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::Disconnect => saw_disconnect = true,
            RoomEvent::Dispose => {
                assert!(saw_disconnect, "disconnect precedes dispose");
                saw_dispose = true;
            }
            _ => {}
        }
    }
    assert!(saw_dispose);

    // Further commands fail: the actor is gone.
    assert!(matches!(
        handle.reserve_seat(sid("late"), json!({})).await.unwrap_err(),
        RoomError::Unavailable(_)
    ));
}

#[tokio::test]
async fn test_unclaimed_room_disposes_after_ttl() {
    let opts = RoomOptions {
        max_clients: 4,
        auto_dispose: true,
        seat_reservation_ttl: Duration::from_millis(40),
        reservation_sweep_interval: Duration::from_millis(10),
        ..RoomOptions::default()
    };
    let (handle, _events) = created(spawn(NoopRoom, opts)).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(matches!(
        handle.info().await.unwrap_err(),
        RoomError::Unavailable(_)
    ));
}
