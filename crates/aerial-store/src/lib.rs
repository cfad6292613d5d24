//! aerial-store
//!
//! Keyed store boundary. Everything above this crate talks to a
//! [`KeyStore`]: per-key hashes, sets and sorted sets, plus fire-and-forget
//! publish. Each call is one round-trip; nothing here spans several keys
//! atomically.
//!
//! Backends:
//! - [`MemoryStore`]: process-local, used by tests and single-process runs.
//! - `RedisStore` (feature `redis`): the shared deployment backend.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::{MemoryStore, Subscription};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use aerial_config::{StoreBackend, StoreSettings};
use anyhow::Result;

/// Shared store handle threaded through every entity.
pub type Store = Arc<dyn KeyStore>;

/// Capability set required of the key-value backend.
///
/// Object safe so callers can hold a [`Store`] without knowing the backend.
/// Empty member lists passed to the set mutators are a no-op.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// Short backend name for logs (e.g. `"memory"`).
    fn backend_name(&self) -> &'static str;

    /// A missing key or field yields `None`, never an error.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>>;

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()>;
    async fn srem(&self, key: &str, members: &[String]) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Re-adding an existing member updates its score.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;
    async fn zrem(&self, key: &str, members: &[String]) -> Result<()>;
    /// Ascending by score; equal scores ordered by member string.
    async fn zrange_withscores(&self, key: &str) -> Result<Vec<(String, f64)>>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Open the backend selected by `settings`.
pub async fn connect(settings: &StoreSettings) -> Result<Store> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::info!(backend = "memory", "store ready");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let store = RedisStore::connect(&settings.url).await?;
            tracing::info!(backend = "redis", "store ready");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => anyhow::bail!(
            "store backend 'redis' requested but aerial-store was built without the `redis` feature"
        ),
    }
}

/// Sort `(member, score)` pairs the way sorted-set range reads return them.
pub fn sort_by_score(entries: &mut [(String, f64)]) {
    entries.sort_by(|(am, a), (bm, b)| a.total_cmp(b).then_with(|| am.cmp(bm)));
}
