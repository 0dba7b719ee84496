//! Remote room calls: request/response RPC over presence pub/sub.
//!
//! A call to a locally owned room short-circuits to its handle. The
//! remote path publishes `[method, requestId, args]` on the room's
//! `$<roomId>` channel and awaits the first `[code, payload]` reply on
//! the per-request channel `<roomId>:<requestId>`. Replies are keyed by
//! request id, so out-of-order completion is safe; a duplicate reply
//! finds the subscription already gone and is dropped.

use std::time::Duration;

use serde_json::{json, Value};
use vestibule_presence::Presence;
use vestibule_protocol::{
    channels, random_id, ProcessId, RoomCall, RoomCallReply, RoomId, SessionId,
};
use vestibule_room::{RoomError, RoomHandle};

use crate::RemoteCallError;

/// Environment variable overriding the default remote-call timeout, in
/// integer milliseconds.
pub const SHORT_TIMEOUT_ENV: &str = "VESTIBULE_PRESENCE_SHORT_TIMEOUT";

const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Request id length on reply channels.
const REQUEST_ID_LEN: usize = 9;

/// The default deadline for a remote room call.
pub fn remote_call_timeout() -> Duration {
    let millis = std::env::var(SHORT_TIMEOUT_ENV)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Duration::from_millis(millis)
}

/// Issues a remote call through presence and awaits the first reply.
///
/// The reply-channel subscription is dropped on the first message or on
/// timeout, restoring the prior subscription count either way.
pub(crate) async fn call_via_presence<P: Presence>(
    presence: &P,
    room_id: &RoomId,
    method: &str,
    args: Option<Vec<Value>>,
    timeout: Duration,
) -> Result<(ProcessId, Value), RemoteCallError> {
    let request_id = random_id(REQUEST_ID_LEN);
    let reply_channel = channels::reply_channel(room_id, &request_id);
    let mut subscription = presence.subscribe(&reply_channel).await?;

    let call = RoomCall::new(method, request_id, args);
    presence
        .publish(&channels::room_channel(room_id), call.to_value())
        .await?;

    let reply = match tokio::time::timeout(timeout, subscription.recv()).await {
        Ok(Some(reply)) => reply,
        Ok(None) | Err(_) => {
            return Err(RemoteCallError::Timeout {
                room_id: room_id.clone(),
                method: method.to_string(),
                timeout,
            });
        }
    };

    match RoomCallReply::from_value(&reply) {
        Ok(RoomCallReply::Success { process_id, value }) => Ok((process_id, value)),
        Ok(RoomCallReply::Error(message)) => Err(RemoteCallError::Remote(message)),
        Err(e) => Err(RemoteCallError::Remote(format!("malformed reply: {e}"))),
    }
}

/// Dispatches a call on a locally owned room.
///
/// Built-in members first (`_reserveSeat`, `hasReservedSeat`, `lock`,
/// `unlock`), then — with absent args — the property tables, then the
/// logic's method table. Unknown names surface as remote-call errors.
pub(crate) async fn dispatch_local(
    handle: &RoomHandle,
    method: &str,
    args: Option<Vec<Value>>,
) -> Result<Value, RemoteCallError> {
    match method {
        "_reserveSeat" => {
            let args = args.ok_or_else(|| {
                RemoteCallError::Remote("_reserveSeat requires [sessionId, options]".into())
            })?;
            let session_id = session_arg(&args, 0, "_reserveSeat")?;
            let options = args.get(1).cloned().unwrap_or_else(|| json!({}));
            let reserved = handle
                .reserve_seat(session_id, options)
                .await
                .map_err(room_error)?;
            Ok(json!(reserved))
        }
        "hasReservedSeat" => {
            let args = args.ok_or_else(|| {
                RemoteCallError::Remote("hasReservedSeat requires [sessionId]".into())
            })?;
            let session_id = session_arg(&args, 0, "hasReservedSeat")?;
            let held = handle
                .has_reserved_seat(&session_id)
                .await
                .map_err(room_error)?;
            Ok(json!(held))
        }
        "lock" => {
            handle.lock().await.map_err(room_error)?;
            Ok(Value::Null)
        }
        "unlock" => {
            handle.unlock().await.map_err(room_error)?;
            Ok(Value::Null)
        }
        _ => match args {
            // Absent args: a property read unless the name is callable.
            None => {
                if let Some(value) = handle.property(method).await.map_err(room_error)? {
                    Ok(value)
                } else {
                    handle.call(method, Vec::new()).await.map_err(room_error)
                }
            }
            Some(args) => handle.call(method, args).await.map_err(room_error),
        },
    }
}

fn session_arg(args: &[Value], index: usize, method: &str) -> Result<SessionId, RemoteCallError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(SessionId::new)
        .ok_or_else(|| RemoteCallError::Remote(format!("{method} missing session id argument")))
}

fn room_error(error: RoomError) -> RemoteCallError {
    RemoteCallError::Remote(error.to_string())
}
