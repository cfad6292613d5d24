//! Redis-backed [`KeyStore`].
//!
//! One multiplexed connection shared by every caller; each trait call maps to
//! exactly one Redis command. Reconnects are left to the connection manager
//! of the deployment, not handled here.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::KeyStore;

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl KeyStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn
            .hget(key, field)
            .await
            .with_context(|| format!("HGET {key} {field}"))?;
        Ok(v)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .with_context(|| format!("HSET {key} {field}"))?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let mut conn = self.conn.clone();
        let v: BTreeMap<String, String> = conn
            .hgetall(key)
            .await
            .with_context(|| format!("HGETALL {key}"))?;
        Ok(v)
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, members.to_vec())
            .await
            .with_context(|| format!("SADD {key}"))?;
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, members.to_vec())
            .await
            .with_context(|| format!("SREM {key}"))?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let v: Vec<String> = conn
            .smembers(key)
            .await
            .with_context(|| format!("SMEMBERS {key}"))?;
        Ok(v)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .with_context(|| format!("ZADD {key} {member}"))?;
        Ok(())
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.zrem::<_, _, ()>(key, members.to_vec())
            .await
            .with_context(|| format!("ZREM {key}"))?;
        Ok(())
    }

    async fn zrange_withscores(&self, key: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        // Redis already orders equal scores lexicographically.
        let v: Vec<(String, f64)> = conn
            .zrange_withscores(key, 0, -1)
            .await
            .with_context(|| format!("ZRANGE {key} 0 -1 WITHSCORES"))?;
        Ok(v)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .with_context(|| format!("PUBLISH {channel}"))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("DEL {key}"))?;
        Ok(())
    }
}
