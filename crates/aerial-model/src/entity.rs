//! Typed entities and the registry factory.
//!
//! Entities are cheap value-handles: a key plus cloned store handles. They
//! carry no cached attributes, so two handles with the same key are the same
//! entity no matter when they were built.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use aerial_store::Store;
use anyhow::Result;

use crate::component::{AttributeHash, OrderedSet, ReferenceSet};
use crate::key::{EntityKey, EntityKind, ResolveError};

/// Id of the single operator the tracker follows.
pub const OPERATOR_ID: &str = "MIVB";

/// Route directions per line. Every line has exactly these two routes.
pub const DIRECTIONS: [u8; 2] = [1, 2];

pub const ATTR_LINE: &str = "line";
pub const ATTR_DIRECTION: &str = "iti";
pub const ATTR_DESTINATION: &str = "destination";
pub const ATTR_LATITUDE: &str = "latitude";
pub const ATTR_LONGITUDE: &str = "longitude";

/// Common surface of every registry kind.
pub trait Model: Sized {
    const KIND: EntityKind;

    /// Build a handle for `id`. Touches no storage.
    fn bind(store: &Store, id: &str) -> Self;

    fn entity_key(&self) -> &EntityKey;

    /// Narrow a resolved entity to this kind.
    fn from_entity(entity: Entity) -> Result<Self, ResolveError>;

    fn id(&self) -> &str {
        self.entity_key().id()
    }
}

/// Closed union of everything the registry can produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    Operator(Operator),
    Line(Line),
    Route(Route),
    RoutePresent(RoutePresent),
    Stop(Stop),
}

impl Entity {
    pub fn entity_key(&self) -> &EntityKey {
        match self {
            Entity::Operator(e) => e.entity_key(),
            Entity::Line(e) => e.entity_key(),
            Entity::Route(e) => e.entity_key(),
            Entity::RoutePresent(e) => e.entity_key(),
            Entity::Stop(e) => e.entity_key(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.entity_key().kind()
    }
}

/// Registry factory: decode a raw `Kind:id` reference into a typed entity.
pub fn resolve(store: &Store, raw: &str) -> Result<Entity, ResolveError> {
    let key = EntityKey::parse(raw)?;
    let id = key.id();
    Ok(match key.kind() {
        EntityKind::Operator => Entity::Operator(Operator::bind(store, id)),
        EntityKind::Line => Entity::Line(Line::bind(store, id)),
        EntityKind::Route => Entity::Route(Route::bind(store, id)),
        EntityKind::RoutePresent => Entity::RoutePresent(RoutePresent::bind(store, id)),
        EntityKind::Stop => Entity::Stop(Stop::bind(store, id)),
    })
}

macro_rules! entity_identity {
    ($ty:ident) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.key == other.key
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key.hash(state);
            }
        }

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> Ordering {
                self.key.cmp(&other.key)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "<{}>", self.key)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.key, f)
            }
        }

        impl Model for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn bind(store: &Store, id: &str) -> Self {
                $ty::bind_key(store, EntityKey::new(EntityKind::$ty, id))
            }

            fn entity_key(&self) -> &EntityKey {
                &self.key
            }

            fn from_entity(entity: Entity) -> Result<Self, ResolveError> {
                match entity {
                    Entity::$ty(e) => Ok(e),
                    other => Err(ResolveError::UnexpectedKind {
                        expected: EntityKind::$ty,
                        found: other.kind(),
                        raw: other.entity_key().as_str().to_string(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Root of the graph: the set of known lines.
#[derive(Clone)]
pub struct Operator {
    key: EntityKey,
    lines: ReferenceSet,
}

entity_identity!(Operator);

impl Operator {
    fn bind_key(store: &Store, key: EntityKey) -> Self {
        Self {
            lines: ReferenceSet::bind(store, &key),
            key,
        }
    }

    /// The singleton operator.
    pub fn new(store: &Store) -> Self {
        Self::bind(store, OPERATOR_ID)
    }

    pub async fn lines(&self) -> Result<Vec<Line>> {
        self.lines.members().await
    }

    pub async fn add_lines(&self, lines: &[Line]) -> Result<()> {
        self.lines.add(lines).await
    }

    pub async fn remove_lines(&self, lines: &[Line]) -> Result<()> {
        self.lines.remove(lines).await
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Line {
    key: EntityKey,
    store: Store,
    attrs: AttributeHash,
    routes: ReferenceSet,
}

entity_identity!(Line);

impl Line {
    fn bind_key(store: &Store, key: EntityKey) -> Self {
        Self {
            attrs: AttributeHash::bind(store, &key),
            routes: ReferenceSet::bind(store, &key),
            store: store.clone(),
            key,
        }
    }

    pub async fn attr(&self, field: &str) -> Result<Option<String>> {
        self.attrs.get(field).await
    }

    pub async fn set_attr(&self, field: &str, value: &str) -> Result<()> {
        self.attrs.set(field, value).await
    }

    pub async fn set_attributes(&self, attributes: &BTreeMap<String, String>) -> Result<()> {
        self.attrs.set_all(attributes).await
    }

    pub async fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.attrs.get_all().await
    }

    /// Handle for this line's route in `direction`. Touches no storage.
    pub fn route(&self, direction: u8) -> Route {
        Route::bind(&self.store, &format!("{}.{}", self.id(), direction))
    }

    pub async fn routes(&self) -> Result<Vec<Route>> {
        self.routes.members().await
    }

    pub async fn add_route(&self, route: &Route) -> Result<()> {
        self.routes.add(std::slice::from_ref(route)).await
    }

    pub async fn delete(&self) -> Result<()> {
        self.attrs.clear().await?;
        self.routes.clear().await
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// One direction of one line: attributes plus the canonical stop order.
#[derive(Clone)]
pub struct Route {
    key: EntityKey,
    store: Store,
    attrs: AttributeHash,
    stops: OrderedSet,
}

entity_identity!(Route);

impl Route {
    fn bind_key(store: &Store, key: EntityKey) -> Self {
        Self {
            attrs: AttributeHash::bind(store, &key),
            stops: OrderedSet::bind(store, &key),
            store: store.clone(),
            key,
        }
    }

    pub async fn attr(&self, field: &str) -> Result<Option<String>> {
        self.attrs.get(field).await
    }

    pub async fn set_attr(&self, field: &str, value: &str) -> Result<()> {
        self.attrs.set(field, value).await
    }

    pub async fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.attrs.get_all().await
    }

    pub async fn line_id(&self) -> Result<Option<String>> {
        self.attr(ATTR_LINE).await
    }

    pub async fn direction(&self) -> Result<Option<String>> {
        self.attr(ATTR_DIRECTION).await
    }

    /// Canonical stop order, ascending by position.
    pub async fn stops(&self) -> Result<Vec<Stop>> {
        self.stops.range().await
    }

    /// Put `stop` at `position` in the canonical order.
    pub async fn place_stop(&self, stop: &Stop, position: usize) -> Result<()> {
        self.stops.add(stop, position as f64).await
    }

    pub async fn remove_stops(&self, stops: &[Stop]) -> Result<()> {
        self.stops.remove(stops).await
    }

    pub fn present(&self) -> RoutePresent {
        RoutePresent::bind(&self.store, self.id())
    }

    /// Handle for stop `id` on this route's store. Touches no storage.
    pub fn stop(&self, id: &str) -> Stop {
        Stop::bind(&self.store, id)
    }

    /// Drop attributes, topology and presence. Stop attributes are shared
    /// with other routes and stay.
    pub async fn delete(&self) -> Result<()> {
        self.attrs.clear().await?;
        self.stops.clear().await?;
        self.present().delete().await
    }
}

// ---------------------------------------------------------------------------
// RoutePresent
// ---------------------------------------------------------------------------

/// Stops of one route that currently report a vehicle. Shares the route id.
#[derive(Clone)]
pub struct RoutePresent {
    key: EntityKey,
    stops: ReferenceSet,
}

entity_identity!(RoutePresent);

impl RoutePresent {
    fn bind_key(store: &Store, key: EntityKey) -> Self {
        Self {
            stops: ReferenceSet::bind(store, &key),
            key,
        }
    }

    pub async fn stops(&self) -> Result<Vec<Stop>> {
        self.stops.members().await
    }

    pub async fn add(&self, stops: &[Stop]) -> Result<()> {
        self.stops.add(stops).await
    }

    pub async fn remove(&self, stops: &[Stop]) -> Result<()> {
        self.stops.remove(stops).await
    }

    pub async fn delete(&self) -> Result<()> {
        self.stops.clear().await
    }
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

/// Physical stop, shared by every route that serves it.
#[derive(Clone)]
pub struct Stop {
    key: EntityKey,
    attrs: AttributeHash,
}

entity_identity!(Stop);

impl Stop {
    fn bind_key(store: &Store, key: EntityKey) -> Self {
        Self {
            attrs: AttributeHash::bind(store, &key),
            key,
        }
    }

    pub async fn attr(&self, field: &str) -> Result<Option<String>> {
        self.attrs.get(field).await
    }

    pub async fn set_attr(&self, field: &str, value: &str) -> Result<()> {
        self.attrs.set(field, value).await
    }

    pub async fn set_attributes(&self, attributes: &BTreeMap<String, String>) -> Result<()> {
        self.attrs.set_all(attributes).await
    }

    pub async fn attributes(&self) -> Result<BTreeMap<String, String>> {
        self.attrs.get_all().await
    }

    /// `(latitude, longitude)`; either may be unpopulated.
    pub async fn coordinates(&self) -> Result<(Option<String>, Option<String>)> {
        let lat = self.attr(ATTR_LATITUDE).await?;
        let lon = self.attr(ATTR_LONGITUDE).await?;
        Ok((lat, lon))
    }
}
