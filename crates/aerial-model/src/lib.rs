//! aerial-model
//!
//! Persistent entity graph over a [`KeyStore`](aerial_store::KeyStore):
//!
//! ```text
//! Operator ─set─▶ Line ─set─▶ Route ─zset─▶ Stop
//!                               └── RoutePresent ─set─▶ Stop
//! ```
//!
//! Store layout per entity `Kind:id`: attributes at `Kind:id:dict`,
//! references at `Kind:id:set`, ordered references at `Kind:id:zset`.
//! Stored references decode through a closed registry ([`resolve`]); an
//! unknown kind is a [`ResolveError`] and must not be retried.

mod component;
mod entity;
mod key;
pub mod query;

pub use component::{AttributeHash, OrderedSet, ReferenceSet};
pub use entity::*;
pub use key::{EntityKey, EntityKind, ResolveError};
