//! Event Cache - An embeddable in-process key/value cache
//!
//! Stores values under string keys with optional TTL expiry, tracks per-item
//! access stats, enforces a capacity ceiling and notifies observers of
//! lifecycle events.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheEvent, CacheItem, EventKind, ItemDetails, ItemStats, SubscriptionId};
pub use config::{CacheConfig, ConfigUpdate};
pub use error::{CacheError, Result};
