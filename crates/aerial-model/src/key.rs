//! Composite entity keys and the closed kind registry.
//!
//! A stored reference is the string `Kind:id`. Parsing splits once on the
//! first `:` so ids may themselves contain colons. The set of kinds is
//! closed: anything else means writer and reader disagree about the schema,
//! and callers must treat the resulting [`ResolveError`] as fatal.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Operator,
    Line,
    Route,
    RoutePresent,
    Stop,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Operator,
        EntityKind::Line,
        EntityKind::Route,
        EntityKind::RoutePresent,
        EntityKind::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Operator => "Operator",
            EntityKind::Line => "Line",
            EntityKind::Route => "Route",
            EntityKind::RoutePresent => "RoutePresent",
            EntityKind::Stop => "Stop",
        }
    }

    /// Case-sensitive: stored keys always use the canonical spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Operator" => Some(EntityKind::Operator),
            "Line" => Some(EntityKind::Line),
            "Route" => Some(EntityKind::Route),
            "RoutePresent" => Some(EntityKind::RoutePresent),
            "Stop" => Some(EntityKind::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a persisted entity. Equality, hashing and ordering use only
/// kind and id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    kind: EntityKind,
    id: String,
    encoded: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        let encoded = format!("{}:{}", kind.as_str(), id);
        Self { kind, id, encoded }
    }

    /// Decode a raw `Kind:id` reference.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let (kind, id) = raw
            .split_once(':')
            .ok_or_else(|| ResolveError::MissingDelimiter {
                raw: raw.to_string(),
            })?;
        let kind = EntityKind::parse(kind).ok_or_else(|| ResolveError::UnknownKind {
            kind: kind.to_string(),
            raw: raw.to_string(),
        })?;
        Ok(Self::new(kind, id))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `Kind:id` string stored as set/sorted-set member.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Store key of one of this entity's sub-structures (`dict`, `set`, `zset`).
    pub fn sub_key(&self, suffix: &str) -> String {
        format!("{}:{}", self.encoded, suffix)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Failure to turn a stored reference into a typed entity.
///
/// Never transient: it indicates a registry/version mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference has no `:` separating kind from id.
    MissingDelimiter { raw: String },
    /// The kind prefix is not part of the closed registry.
    UnknownKind { kind: String, raw: String },
    /// The reference resolved, but to a kind the container must not hold.
    UnexpectedKind {
        expected: EntityKind,
        found: EntityKind,
        raw: String,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDelimiter { raw } => {
                write!(f, "stored reference '{raw}' has no kind delimiter")
            }
            Self::UnknownKind { kind, raw } => {
                write!(f, "unknown entity kind '{kind}' in stored reference '{raw}'")
            }
            Self::UnexpectedKind {
                expected,
                found,
                raw,
            } => write!(
                f,
                "stored reference '{raw}' is a {found}, expected a {expected}"
            ),
        }
    }
}

impl std::error::Error for ResolveError {}
