//! In-process presence for single-node deployments and tests.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::{Presence, PresenceError, Subscription, CHANNEL_CAPACITY};

/// In-memory [`Presence`] implementation.
///
/// Channels are tokio broadcast channels keyed by name; counters and sets
/// live behind their own locks so `incr`/`decr` are atomic. Channel
/// entries whose last subscriber is gone are dropped on the next publish.
#[derive(Debug, Default)]
pub struct LocalPresence {
    channels: RwLock<HashMap<String, broadcast::Sender<Value>>>,
    counters: Mutex<HashMap<String, i64>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl LocalPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of live subscribers on a channel. Diagnostics only.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// The number of channels with at least one live subscriber.
    pub async fn channel_count(&self) -> usize {
        self.channels
            .read()
            .await
            .values()
            .filter(|tx| tx.receiver_count() > 0)
            .count()
    }
}

impl Presence for LocalPresence {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, PresenceError> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(Subscription::new(channel.to_string(), tx.subscribe()))
    }

    async fn publish(&self, channel: &str, message: Value) -> Result<(), PresenceError> {
        let dead = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                // send only fails when every receiver is gone.
                Some(tx) => tx.send(message).is_err(),
                None => false,
            }
        };
        if dead {
            let mut channels = self.channels.write().await;
            if channels.get(channel).is_some_and(|tx| tx.receiver_count() == 0) {
                channels.remove(channel);
            }
        }
        Ok(())
    }

    async fn sadd(&self, set: &str, member: &str) -> Result<(), PresenceError> {
        self.sets
            .lock()
            .await
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, set: &str, member: &str) -> Result<(), PresenceError> {
        let mut sets = self.sets.lock().await;
        if let Some(members) = sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                sets.remove(set);
            }
        }
        Ok(())
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, PresenceError> {
        Ok(self
            .sets
            .lock()
            .await
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn incr(&self, key: &str) -> Result<i64, PresenceError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn decr(&self, key: &str) -> Result<i64, PresenceError> {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value -= 1;
        Ok(*value)
    }

    async fn del(&self, key: &str) -> Result<(), PresenceError> {
        self.counters.lock().await.remove(key);
        Ok(())
    }
}
