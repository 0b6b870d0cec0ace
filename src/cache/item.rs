//! Cache Item Module
//!
//! Defines the item supplied to `set` and the per-key metadata kept alongside it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// == Cache Item ==
/// An item to store, as passed to `set` or used to seed a cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem<V> {
    /// The key to store under
    pub key: String,
    /// The stored value
    pub value: V,
    /// Optional TTL in seconds, None = use the cache default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl<V> CacheItem<V> {
    /// Creates an item that uses the cache's default TTL.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }

    /// Sets a per-item TTL override in seconds.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl = Some(ttl_seconds);
        self
    }
}

// == Item Stats ==
/// Access statistics for a single item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemStats {
    /// Number of successful reads through `get`
    pub accesses: u64,
}

impl ItemStats {
    /// Creates a new ItemStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Access ==
    /// Increments the access counter.
    pub fn record_access(&mut self) {
        self.accesses += 1;
    }
}

// == Item Details ==
/// Metadata kept for every live key.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetails {
    /// Per-item TTL override in seconds
    pub ttl: Option<u64>,
    /// When the item was last set or had its expiry reset
    pub time_added: Instant,
    /// Access statistics
    pub stats: ItemStats,
    /// Flagged by a sweep while `remove_on_expire` is off
    pub expired: bool,
}

impl ItemDetails {
    // == Constructor ==
    /// Creates fresh metadata stamped at `now`.
    pub fn new(ttl: Option<u64>, now: Instant) -> Self {
        Self {
            ttl,
            time_added: now,
            stats: ItemStats::new(),
            expired: false,
        }
    }

    // == Effective TTL ==
    /// Returns the item's own TTL, else the cache default; None when it never expires.
    pub fn effective_ttl(&self, default_ttl: u64) -> Option<Duration> {
        match self.ttl.unwrap_or(default_ttl) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    // == Has Elapsed ==
    /// Checks whether the effective TTL has fully elapsed at `now`.
    ///
    /// Boundary condition: an item whose age equals its TTL has elapsed.
    pub fn has_elapsed(&self, default_ttl: u64, now: Instant) -> bool {
        match self.effective_ttl(default_ttl) {
            Some(ttl) => now.saturating_duration_since(self.time_added) >= ttl,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining time before the item is due, or None if it never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once the TTL has elapsed.
    pub fn ttl_remaining(&self, default_ttl: u64, now: Instant) -> Option<Duration> {
        self.effective_ttl(default_ttl).map(|ttl| {
            let age = now.saturating_duration_since(self.time_added);
            ttl.saturating_sub(age)
        })
    }

    // == Reset ==
    /// Restarts the TTL countdown and clears the expired flag.
    pub fn reset_expiry(&mut self, now: Instant) {
        self.time_added = now;
        self.expired = false;
    }
}
