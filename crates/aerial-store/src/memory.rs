//! Process-local [`KeyStore`] backend.
//!
//! All structures live behind one async mutex; `publish` fans out over a
//! broadcast bus. A [`Subscription`] is bound to one channel, like Redis
//! SUBSCRIBE, and only sees messages sent after it was created.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, Mutex};

use crate::{sort_by_score, KeyStore};

/// One message on the bus, tagged with its channel.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Published {
    channel: String,
    payload: String,
}

/// Receiving end of one channel on a [`MemoryStore`].
pub struct Subscription {
    channel: String,
    rx: broadcast::Receiver<Published>,
}

impl Subscription {
    /// Next payload already published on this channel, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) if msg.channel == self.channel => return Some(msg.payload),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next payload on this channel; `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.channel == self.channel => return Some(msg.payload),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Default)]
struct Keyspace {
    hashes: HashMap<String, BTreeMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    bus: broadcast::Sender<Published>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<Published>(1024);
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            bus,
        }
    }

    pub fn subscribe(&self, channel: impl Into<String>) -> Subscription {
        Subscription {
            channel: channel.into(),
            rx: self.bus.subscribe(),
        }
    }

    /// Every key currently holding data, sorted. Test and debug helper.
    pub async fn keys(&self) -> Vec<String> {
        let ks = self.keyspace.lock().await;
        let mut out: Vec<String> = ks
            .hashes
            .keys()
            .chain(ks.sets.keys())
            .chain(ks.zsets.keys())
            .cloned()
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[async_trait::async_trait]
impl KeyStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let ks = self.keyspace.lock().await;
        Ok(ks.hashes.get(key).and_then(|h| h.get(field)).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut ks = self.keyspace.lock().await;
        ks.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let ks = self.keyspace.lock().await;
        Ok(ks.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut ks = self.keyspace.lock().await;
        let set = ks.sets.entry(key.to_string()).or_default();
        set.extend(members.iter().cloned());
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[String]) -> Result<()> {
        let mut ks = self.keyspace.lock().await;
        let now_empty = match ks.sets.get_mut(key) {
            Some(set) => {
                for m in members {
                    set.remove(m);
                }
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            ks.sets.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let ks = self.keyspace.lock().await;
        Ok(ks
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut ks = self.keyspace.lock().await;
        ks.zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<()> {
        let mut ks = self.keyspace.lock().await;
        let now_empty = match ks.zsets.get_mut(key) {
            Some(zset) => {
                for m in members {
                    zset.remove(m);
                }
                zset.is_empty()
            }
            None => false,
        };
        if now_empty {
            ks.zsets.remove(key);
        }
        Ok(())
    }

    async fn zrange_withscores(&self, key: &str) -> Result<Vec<(String, f64)>> {
        let ks = self.keyspace.lock().await;
        let mut entries: Vec<(String, f64)> = ks
            .zsets
            .get(key)
            .map(|z| z.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        sort_by_score(&mut entries);
        Ok(entries)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        // No subscribers is not an error: the message is simply dropped.
        let _ = self.bus.send(Published {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut ks = self.keyspace.lock().await;
        ks.hashes.remove(key);
        ks.sets.remove(key);
        ks.zsets.remove(key);
        Ok(())
    }
}
