//! Store capabilities bound to one owner key.
//!
//! An entity is a bundle of these: a Line owns an [`AttributeHash`] and a
//! [`ReferenceSet`], a Route an [`AttributeHash`] and an [`OrderedSet`].
//! Members of sets are `Kind:id` references and come back out as typed
//! entities through the registry.

use std::collections::BTreeMap;

use aerial_store::Store;
use anyhow::Result;

use crate::entity::{resolve, Model};
use crate::key::EntityKey;

const HASH_SUFFIX: &str = "dict";
const SET_SUFFIX: &str = "set";
const SORTED_SET_SUFFIX: &str = "zset";

// ---------------------------------------------------------------------------
// Attribute hash
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AttributeHash {
    store: Store,
    key: String,
}

impl AttributeHash {
    pub(crate) fn bind(store: &Store, owner: &EntityKey) -> Self {
        Self {
            store: store.clone(),
            key: owner.sub_key(HASH_SUFFIX),
        }
    }

    /// `None` means "not yet populated".
    pub async fn get(&self, field: &str) -> Result<Option<String>> {
        self.store.hget(&self.key, field).await
    }

    pub async fn set(&self, field: &str, value: &str) -> Result<()> {
        self.store.hset(&self.key, field, value).await
    }

    pub async fn get_all(&self) -> Result<BTreeMap<String, String>> {
        self.store.hgetall(&self.key).await
    }

    /// Write every pair, overwriting existing values.
    pub async fn set_all(&self, attributes: &BTreeMap<String, String>) -> Result<()> {
        for (field, value) in attributes {
            self.set(field, value).await?;
        }
        Ok(())
    }

    pub(crate) async fn clear(&self) -> Result<()> {
        self.store.del(&self.key).await
    }
}

// ---------------------------------------------------------------------------
// Unordered reference set
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ReferenceSet {
    store: Store,
    key: String,
}

impl ReferenceSet {
    pub(crate) fn bind(store: &Store, owner: &EntityKey) -> Self {
        Self {
            store: store.clone(),
            key: owner.sub_key(SET_SUFFIX),
        }
    }

    pub async fn add<T: Model>(&self, members: &[T]) -> Result<()> {
        self.store.sadd(&self.key, &encode(members)).await
    }

    pub async fn remove<T: Model>(&self, members: &[T]) -> Result<()> {
        self.store.srem(&self.key, &encode(members)).await
    }

    /// Resolve every stored member into a `T`. Order is backend-defined.
    pub async fn members<T: Model>(&self) -> Result<Vec<T>> {
        let raw = self.store.smembers(&self.key).await?;
        decode(&self.store, &raw)
    }

    pub(crate) async fn clear(&self) -> Result<()> {
        self.store.del(&self.key).await
    }
}

// ---------------------------------------------------------------------------
// Score-ordered reference set
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OrderedSet {
    store: Store,
    key: String,
}

impl OrderedSet {
    pub(crate) fn bind(store: &Store, owner: &EntityKey) -> Self {
        Self {
            store: store.clone(),
            key: owner.sub_key(SORTED_SET_SUFFIX),
        }
    }

    pub async fn add<T: Model>(&self, member: &T, score: f64) -> Result<()> {
        self.store
            .zadd(&self.key, member.entity_key().as_str(), score)
            .await
    }

    pub async fn remove<T: Model>(&self, members: &[T]) -> Result<()> {
        self.store.zrem(&self.key, &encode(members)).await
    }

    /// Members ascending by score.
    pub async fn range<T: Model>(&self) -> Result<Vec<T>> {
        let raw: Vec<String> = self
            .store
            .zrange_withscores(&self.key)
            .await?
            .into_iter()
            .map(|(member, _score)| member)
            .collect();
        decode(&self.store, &raw)
    }

    pub(crate) async fn clear(&self) -> Result<()> {
        self.store.del(&self.key).await
    }
}

fn encode<T: Model>(members: &[T]) -> Vec<String> {
    members
        .iter()
        .map(|m| m.entity_key().as_str().to_string())
        .collect()
}

fn decode<T: Model>(store: &Store, raw: &[String]) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(raw.len());
    for r in raw {
        let entity = resolve(store, r)?;
        out.push(T::from_entity(entity)?);
    }
    Ok(out)
}
