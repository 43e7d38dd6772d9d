//! Change events delivered to the consumer.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::kind::ResourceKind;
use crate::snapshot::{NamespacedName, Snapshot};

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The object appeared
    Added,
    /// The object changed
    Updated,
    /// The object is gone
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Added => "Added",
            EventKind::Updated => "Updated",
            EventKind::Deleted => "Deleted",
        })
    }
}

/// Raw event produced by the cache layer for one watch, before filtering.
///
/// `previous` is only set for updates. For deletes `current` holds the last
/// known state of the object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// What happened
    pub event_kind: EventKind,
    /// State before an update
    pub previous: Option<Snapshot>,
    /// New state, or last known state for deletes
    pub current: Snapshot,
}

impl RawEvent {
    /// Object seen for the first time.
    pub fn added(current: Snapshot) -> Self {
        Self {
            event_kind: EventKind::Added,
            previous: None,
            current,
        }
    }

    /// Object changed from `previous` to `current`.
    pub fn updated(previous: Snapshot, current: Snapshot) -> Self {
        Self {
            event_kind: EventKind::Updated,
            previous: Some(previous),
            current,
        }
    }

    /// Object removed; `last_known` is its final state.
    pub fn deleted(last_known: Snapshot) -> Self {
        Self {
            event_kind: EventKind::Deleted,
            previous: None,
            current: last_known,
        }
    }
}

/// Unit written to the fan-in channel. Carries identity only; the consumer
/// reads current state back from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Kind of the object
    pub kind: ResourceKind,
    /// Watch that produced the event
    pub registration_name: Arc<str>,
    /// Object identity
    pub namespaced_name: NamespacedName,
    /// What happened
    pub event_kind: EventKind,
    /// When the watch task accepted the event
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub(crate) fn from_raw(kind: ResourceKind, registration_name: Arc<str>, raw: RawEvent) -> Self {
        Self {
            kind,
            registration_name,
            namespaced_name: raw.current.namespaced_name,
            event_kind: raw.event_kind,
            observed_at: Utc::now(),
        }
    }
}
