//! Presence layer for Vestibule.
//!
//! Presence is the shared pub/sub, counter, and set service spanning all
//! processes in the fleet. The matchmaker builds three mechanisms on it:
//! per-room RPC channels, per-room-type eligibility sets, and per-room-type
//! admission counters.
//!
//! The [`Presence`] trait is the contract; [`LocalPresence`] is the
//! in-process implementation used by single-node deployments and tests.
//! A network-backed driver (e.g. Redis) implements the same trait.

mod error;
mod local;

pub use error::PresenceError;
pub use local::LocalPresence;

use std::future::Future;

use serde_json::Value;
use tokio::sync::broadcast;

/// Buffered messages per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// The shared pub/sub + key/value service.
///
/// All operations may fail with transient errors. Callers treat failure
/// of the idempotent operations (`del`, `srem`) as "no effect" and
/// surface failures of the rest. `incr`/`decr` must be atomic.
///
/// Methods return `Send` futures because they are awaited from spawned
/// tasks; implementations just write `async fn`.
pub trait Presence: Send + Sync + 'static {
    /// Subscribes to a channel. Dropping the returned [`Subscription`]
    /// unsubscribes.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<Subscription, PresenceError>> + Send;

    /// Publishes a message to every current subscriber of a channel.
    /// Publishing to a channel with no subscribers is not an error.
    fn publish(
        &self,
        channel: &str,
        message: Value,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Adds a member to a set.
    fn sadd(
        &self,
        set: &str,
        member: &str,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Removes a member from a set.
    fn srem(
        &self,
        set: &str,
        member: &str,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Returns all members of a set.
    fn smembers(
        &self,
        set: &str,
    ) -> impl Future<Output = Result<Vec<String>, PresenceError>> + Send;

    /// Atomically increments a counter and returns the new value.
    fn incr(&self, key: &str) -> impl Future<Output = Result<i64, PresenceError>> + Send;

    /// Atomically decrements a counter and returns the new value.
    fn decr(&self, key: &str) -> impl Future<Output = Result<i64, PresenceError>> + Send;

    /// Deletes a counter key.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), PresenceError>> + Send;
}

/// A live channel subscription.
///
/// Wraps a broadcast receiver; messages published after the subscription
/// was created are delivered in publish order per publisher.
pub struct Subscription {
    channel: String,
    receiver: broadcast::Receiver<Value>,
}

impl Subscription {
    pub(crate) fn new(channel: String, receiver: broadcast::Receiver<Value>) -> Self {
        Self { channel, receiver }
    }

    /// The channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receives the next message, or `None` once the channel is gone.
    ///
    /// A lagged subscriber skips the overwritten backlog and keeps
    /// receiving from the oldest retained message.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        channel = %self.channel,
                        skipped,
                        "subscription lagged, messages dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
