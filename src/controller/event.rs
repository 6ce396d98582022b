//! Resource change events.

use std::fmt;

use crate::resource::{ResourceKey, RuleObject};

/// A resource change observed by a watch source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Add(ResourceKey),
    Update(ResourceKey),
    /// The object is gone from the cache; the snapshot is its last known state.
    Delete(ResourceKey, RuleObject),
}

impl Event {
    pub fn key(&self) -> &ResourceKey {
        match self {
            Event::Add(key) | Event::Update(key) | Event::Delete(key, _) => key,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Add(_) => EventKind::Add,
            Event::Update(_) => EventKind::Update,
            Event::Delete(..) => EventKind::Delete,
        }
    }

    /// Delete event whose key is taken from the snapshot.
    pub fn deleted(snapshot: RuleObject) -> Self {
        Event::Delete(snapshot.key(), snapshot)
    }
}

/// Event discriminant, used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
