//! Cache Module
//!
//! Provides in-process caching with TTL expiry, per-item access stats,
//! capacity limits and lifecycle events.

mod events;
mod handle;
mod item;
mod order;
mod store;


// Re-export public types
pub use events::{CacheEvent, EventKind, Observer, Observers, SubscriptionId};
pub use handle::Cache;
pub use item::{CacheItem, ItemDetails, ItemStats};
pub use order::InsertionOrder;
pub use store::CacheStore;

pub(crate) use handle::Shared;
