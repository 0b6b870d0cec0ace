//! Cache Events Module
//!
//! Lifecycle events and the observer registry they are published to.

use std::fmt;
use std::sync::Arc;

// == Event Kind ==
/// The name an observer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Get,
    Set,
    Remove,
    Pop,
    Clear,
    Expire,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        EventKind::Get,
        EventKind::Set,
        EventKind::Remove,
        EventKind::Pop,
        EventKind::Clear,
        EventKind::Expire,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Get => "get",
            EventKind::Set => "set",
            EventKind::Remove => "remove",
            EventKind::Pop => "pop",
            EventKind::Clear => "clear",
            EventKind::Expire => "expire",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Event ==
/// A single notification published by the cache.
///
/// `value` is the value at the time of the event; it is `None` when the key
/// was absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent<V> {
    Get { key: String, value: Option<V> },
    Set { key: String, value: V },
    Remove { key: String, value: Option<V> },
    Pop { key: String, value: Option<V> },
    Clear,
    Expire { key: String, value: V },
}

impl<V> CacheEvent<V> {
    pub fn kind(&self) -> EventKind {
        match self {
            CacheEvent::Get { .. } => EventKind::Get,
            CacheEvent::Set { .. } => EventKind::Set,
            CacheEvent::Remove { .. } => EventKind::Remove,
            CacheEvent::Pop { .. } => EventKind::Pop,
            CacheEvent::Clear => EventKind::Clear,
            CacheEvent::Expire { .. } => EventKind::Expire,
        }
    }

    /// The key the event concerns, None for `Clear`.
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Get { key, .. }
            | CacheEvent::Set { key, .. }
            | CacheEvent::Remove { key, .. }
            | CacheEvent::Pop { key, .. }
            | CacheEvent::Expire { key, .. } => Some(key.as_str()),
            CacheEvent::Clear => None,
        }
    }

    /// The value carried by the event, if any.
    pub fn value(&self) -> Option<&V> {
        match self {
            CacheEvent::Get { value, .. }
            | CacheEvent::Remove { value, .. }
            | CacheEvent::Pop { value, .. } => value.as_ref(),
            CacheEvent::Set { value, .. } | CacheEvent::Expire { value, .. } => Some(value),
            CacheEvent::Clear => None,
        }
    }
}

// == Observers ==
/// Identifies a subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for each matching event.
pub type Observer<V> = Arc<dyn Fn(&CacheEvent<V>) + Send + Sync>;

/// Registry of observers keyed by event kind.
pub struct Observers<V> {
    entries: Vec<(SubscriptionId, EventKind, Observer<V>)>,
    next_id: u64,
}

impl<V> Default for Observers<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<V> fmt::Debug for Observers<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl<V> Observers<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer` for events of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, observer: Observer<V>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, kind, observer));
        id
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Observers registered for `kind`, in subscription order.
    pub fn listeners(&self, kind: EventKind) -> Vec<Observer<V>> {
        self.entries
            .iter()
            .filter(|(_, entry_kind, _)| *entry_kind == kind)
            .map(|(_, _, observer)| Arc::clone(observer))
            .collect()
    }

    /// Number of registered observers across all kinds.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
