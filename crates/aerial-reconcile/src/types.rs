use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Provider field carrying the stop id.
pub const FIELD_ID: &str = "id";
/// Provider field carrying presence; only the exact value `TRUE` counts.
pub const FIELD_PRESENT: &str = "present";
pub const PRESENT_TRUE: &str = "TRUE";

/// Stop id used on the missing side of an entered or left event.
pub const NO_STOP_ID: &str = "-1";

/// Inferred vehicle movement along one route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Movement<T> {
    /// A vehicle appeared with no earlier present stop to come from.
    Entered { destination: T },
    /// A vehicle went from `origin` to a later stop `destination`.
    Moved { origin: T, destination: T },
    /// A vehicle left the route after `origin`.
    Left { origin: T },
}

impl<T> Movement<T> {
    pub fn origin(&self) -> Option<&T> {
        match self {
            Movement::Entered { .. } => None,
            Movement::Moved { origin, .. } | Movement::Left { origin } => Some(origin),
        }
    }

    pub fn destination(&self) -> Option<&T> {
        match self {
            Movement::Entered { destination } | Movement::Moved { destination, .. } => {
                Some(destination)
            }
            Movement::Left { .. } => None,
        }
    }
}

/// One stop record as fetched for a route, already interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopSnapshot {
    pub id: String,
    /// Every provider field, copied verbatim into the stop attributes on a
    /// full pass.
    pub attributes: BTreeMap<String, String>,
    pub present: bool,
}

impl StopSnapshot {
    /// `None` when the record carries no id.
    pub fn from_record(record: &BTreeMap<String, String>) -> Option<Self> {
        let id = record.get(FIELD_ID)?.clone();
        let present = record
            .get(FIELD_PRESENT)
            .map(|v| v == PRESENT_TRUE)
            .unwrap_or(false);
        Some(Self {
            id,
            attributes: record.clone(),
            present,
        })
    }

    /// Interpret a fetched itinerary, dropping records without an id.
    pub fn from_records(records: &[BTreeMap<String, String>]) -> Vec<Self> {
        records
            .iter()
            .filter_map(|r| {
                let snap = Self::from_record(r);
                if snap.is_none() {
                    tracing::warn!(fields = ?r.keys().collect::<Vec<_>>(), "stop record without id skipped");
                }
                snap
            })
            .collect()
    }
}

/// Stop side of a published event. Coordinates are strings as stored;
/// unpopulated ones are empty.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventStop {
    pub id: String,
    pub lat: String,
    pub lon: String,
}

impl EventStop {
    /// The missing side of an entered or left event.
    pub fn none() -> Self {
        Self {
            id: NO_STOP_ID.to_string(),
            lat: String::new(),
            lon: String::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.id == NO_STOP_ID
    }
}

/// Wire form of one movement:
/// `{"route": .., "origin": {"id","lat","lon"}, "destination": {..}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub route: String,
    pub origin: EventStop,
    pub destination: EventStop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Entered,
    Moved,
    Left,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match (self.origin.is_none(), self.destination.is_none()) {
            (true, _) => ChangeKind::Entered,
            (false, true) => ChangeKind::Left,
            (false, false) => ChangeKind::Moved,
        }
    }
}

/// What one pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassOutcome {
    pub full: bool,
    /// Stops in the topology after the pass.
    pub stops: usize,
    pub added: usize,
    pub removed: usize,
    pub events: Vec<ChangeEvent>,
}
