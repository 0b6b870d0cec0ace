//! Cache Store Module
//!
//! Single-threaded cache engine: values, per-key metadata, insertion order,
//! policy checks, expiry sweep and purge.
//!
//! Every mutating call validates first and only then touches state, so a
//! returned error always leaves the store unchanged. Events produced by a
//! call are buffered and collected with [`CacheStore::take_events`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEvent, CacheItem, InsertionOrder, ItemDetails, ItemStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Main cache storage with TTL metadata and policy enforcement.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    data: HashMap<String, V>,
    /// Per-key metadata, keyed like `data`
    details: HashMap<String, ItemDetails>,
    /// Insertion order of live keys
    order: InsertionOrder,
    /// Active policy
    config: CacheConfig,
    /// Events produced since the last drain
    events: Vec<CacheEvent<V>>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store with the given policy.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            data: HashMap::new(),
            details: HashMap::new(),
            order: InsertionOrder::new(),
            config,
            events: Vec::new(),
        }
    }

    /// Creates a store seeded with `items`.
    ///
    /// Seeding bypasses the duplicate/capacity policies and publishes no events;
    /// every seed shares the same creation timestamp.
    pub fn with_items(config: CacheConfig, items: Vec<CacheItem<V>>) -> Self {
        let mut store = Self::new(config);
        let now = Instant::now();
        for item in items {
            store.insert(item, now);
        }
        store
    }

    // == Config ==
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Replaces the active policy. Stored items are left untouched.
    pub fn set_config(&mut self, config: CacheConfig) {
        self.config = config;
    }

    // == Events ==
    /// Drains the events produced since the last call, in emission order.
    pub fn take_events(&mut self) -> Vec<CacheEvent<V>> {
        std::mem::take(&mut self.events)
    }

    // == Get ==
    /// Reads a single key, bumping its access count if present.
    pub fn get(&mut self, key: &str) -> Result<Option<V>> {
        self.check_missing(&[key])?;
        Ok(self.read(key))
    }

    /// Reads several keys; an empty slice reads every key.
    ///
    /// Absent keys are omitted from the result but still produce a `get` event.
    pub fn get_many(&mut self, keys: &[&str]) -> Result<HashMap<String, V>> {
        self.check_missing(keys)?;

        let mut items = HashMap::new();
        for key in self.resolve_keys(keys) {
            if let Some(value) = self.read(&key) {
                items.insert(key, value);
            }
        }
        Ok(items)
    }

    // == Set ==
    /// Stores a single item.
    pub fn set(&mut self, item: CacheItem<V>) -> Result<()> {
        self.set_many(vec![item])
    }

    /// Stores a batch of items in order.
    ///
    /// Existing keys are overwritten with fresh metadata. Net-new keys are
    /// admitted until capacity is reached; the rest are dropped unless
    /// `error_on_full` rejects the whole batch up front.
    pub fn set_many(&mut self, items: Vec<CacheItem<V>>) -> Result<()> {
        if self.config.error_on_duplicate {
            let duplicates: Vec<String> = dedup(
                items
                    .iter()
                    .map(|item| item.key.as_str())
                    .filter(|key| self.data.contains_key(*key)),
            );
            if !duplicates.is_empty() {
                return Err(CacheError::DuplicateKeys(duplicates));
            }
        }

        if let (Some(capacity), true) = (self.config.capacity, self.config.error_on_full) {
            let new_keys = dedup(
                items
                    .iter()
                    .map(|item| item.key.as_str())
                    .filter(|key| !self.data.contains_key(*key)),
            )
            .len();
            let requested = self.data.len() + new_keys;
            if requested > capacity {
                return Err(CacheError::CapacityExceeded {
                    capacity,
                    requested,
                });
            }
        }

        let now = Instant::now();
        let total = items.len();
        let mut admitted = 0;
        for item in items {
            if !self.data.contains_key(&item.key) && self.is_full() {
                continue;
            }
            let key = item.key.clone();
            let value = item.value.clone();
            self.insert(item, now);
            self.events.push(CacheEvent::Set { key, value });
            admitted += 1;
        }

        debug!(
            "set: admitted {} of {} items ({} live)",
            admitted,
            total,
            self.data.len()
        );
        Ok(())
    }

    // == Remove ==
    /// Removes the given keys; an empty slice removes everything.
    pub fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        self.check_missing(keys)?;

        for key in self.resolve_keys(keys) {
            let value = self.take(&key);
            self.events.push(CacheEvent::Remove { key, value });
        }
        Ok(())
    }

    // == Pop ==
    /// Reads and removes a single key.
    pub fn pop(&mut self, key: &str) -> Result<Option<V>> {
        self.check_missing(&[key])?;

        let value = self.take(key);
        self.events.push(CacheEvent::Pop {
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Reads and removes several keys; an empty slice pops everything.
    pub fn pop_many(&mut self, keys: &[&str]) -> Result<HashMap<String, V>> {
        self.check_missing(keys)?;

        let mut items = HashMap::new();
        for key in self.resolve_keys(keys) {
            let value = self.take(&key);
            self.events.push(CacheEvent::Pop {
                key: key.clone(),
                value: value.clone(),
            });
            if let Some(value) = value {
                items.insert(key, value);
            }
        }
        Ok(items)
    }

    // == Clear ==
    /// Drops every value together with its metadata.
    pub fn clear(&mut self) {
        self.data.clear();
        self.details.clear();
        self.order.clear();
        self.events.push(CacheEvent::Clear);
    }

    // == Introspection ==
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.order.to_vec()
    }

    /// Values in insertion order.
    pub fn values(&self) -> Vec<V> {
        self.order
            .iter()
            .filter_map(|key| self.data.get(key).cloned())
            .collect()
    }

    /// Key/value pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, V)> {
        self.order
            .iter()
            .filter_map(|key| self.data.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot of a key's metadata.
    pub fn details(&self, key: &str) -> Option<ItemDetails> {
        self.details.get(key).cloned()
    }

    /// Time left before the key becomes due, None if absent or never expiring.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.details
            .get(key)
            .and_then(|details| details.ttl_remaining(self.config.default_ttl, Instant::now()))
    }

    /// Whether a sweep has flagged the key as expired.
    pub fn is_expired(&self, key: &str) -> bool {
        self.details.get(key).is_some_and(|details| details.expired)
    }

    // == Stats ==
    /// Access stats for a single key.
    pub fn stats(&self, key: &str) -> Result<Option<ItemStats>> {
        self.check_missing(&[key])?;
        Ok(self.details.get(key).map(|details| details.stats))
    }

    /// Access stats for several keys (all keys when empty), omitting absent ones.
    pub fn stats_many(&self, keys: &[&str]) -> Result<HashMap<String, ItemStats>> {
        self.check_missing(keys)?;

        Ok(self
            .resolve_keys(keys)
            .into_iter()
            .filter_map(|key| {
                let stats = self.details.get(&key)?.stats;
                Some((key, stats))
            })
            .collect())
    }

    /// Resets access counts for the given keys (all keys when empty).
    pub fn clear_stats(&mut self, keys: &[&str]) -> Result<()> {
        self.check_missing(keys)?;

        for key in self.resolve_keys(keys) {
            if let Some(details) = self.details.get_mut(&key) {
                details.stats = ItemStats::new();
            }
        }
        Ok(())
    }

    // == TTL ==
    /// Overwrites the TTL override of the given keys (all keys when empty).
    ///
    /// The countdown is not restarted.
    pub fn set_ttl(&mut self, ttl: u64, keys: &[&str]) -> Result<()> {
        self.check_missing(keys)?;

        for key in self.resolve_keys(keys) {
            if let Some(details) = self.details.get_mut(&key) {
                details.ttl = Some(ttl);
            }
        }
        Ok(())
    }

    /// Restarts the TTL countdown of the given keys (all keys when empty).
    pub fn reset_expiry(&mut self, keys: &[&str]) -> Result<()> {
        self.check_missing(keys)?;

        let now = Instant::now();
        for key in self.resolve_keys(keys) {
            if let Some(details) = self.details.get_mut(&key) {
                details.reset_expiry(now);
            }
        }
        Ok(())
    }

    // == Purge ==
    /// Evicts every item whose effective TTL has elapsed, without events.
    ///
    /// Returns the number of items removed.
    pub fn purge(&mut self) -> usize {
        let now = Instant::now();
        let default_ttl = self.config.default_ttl;
        let due: Vec<String> = self
            .order
            .iter()
            .filter(|key| {
                self.details
                    .get(*key)
                    .is_some_and(|details| details.has_elapsed(default_ttl, now))
            })
            .cloned()
            .collect();

        for key in &due {
            self.take(key);
        }

        debug!("purge: removed {} items", due.len());
        due.len()
    }

    // == Sweep ==
    /// Runs one expiry pass over every stored item.
    ///
    /// Expired items are evicted or flagged according to `remove_on_expire`,
    /// and each produces one `expire` event. Returns the number of events.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let CacheConfig {
            default_ttl,
            remove_on_expire,
            expire_once,
            ..
        } = self.config;

        let mut expired = 0;
        for key in self.order.to_vec() {
            let Some(details) = self.details.get_mut(&key) else {
                continue;
            };
            if details.expired && expire_once {
                continue;
            }
            if details.effective_ttl(default_ttl).is_none() {
                continue;
            }
            if !details.expired && !details.has_elapsed(default_ttl, now) {
                continue;
            }

            let value = if remove_on_expire {
                self.take(&key)
            } else {
                details.expired = true;
                self.data.get(&key).cloned()
            };
            if let Some(value) = value {
                self.events.push(CacheEvent::Expire { key, value });
                expired += 1;
            }
        }
        expired
    }

    // == Helpers ==
    /// Fails with every absent key when `error_on_miss` is set.
    fn check_missing(&self, keys: &[&str]) -> Result<()> {
        if !self.config.error_on_miss {
            return Ok(());
        }
        let missing = dedup(keys.iter().copied().filter(|key| !self.data.contains_key(*key)));
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CacheError::MissingKeys(missing))
        }
    }

    /// Requested keys, or every live key when none were given.
    fn resolve_keys(&self, keys: &[&str]) -> Vec<String> {
        if keys.is_empty() {
            self.order.to_vec()
        } else {
            keys.iter().map(|key| key.to_string()).collect()
        }
    }

    fn is_full(&self) -> bool {
        self.config
            .capacity
            .is_some_and(|capacity| self.data.len() >= capacity)
    }

    fn read(&mut self, key: &str) -> Option<V> {
        let value = self.data.get(key).cloned();
        if value.is_some() {
            if let Some(details) = self.details.get_mut(key) {
                details.stats.record_access();
            }
        }
        self.events.push(CacheEvent::Get {
            key: key.to_string(),
            value: value.clone(),
        });
        value
    }

    fn insert(&mut self, item: CacheItem<V>, now: Instant) {
        if self.data.insert(item.key.clone(), item.value).is_none() {
            self.order.push(&item.key);
        }
        self.details
            .insert(item.key, ItemDetails::new(item.ttl, now));
    }

    fn take(&mut self, key: &str) -> Option<V> {
        self.details.remove(key);
        let value = self.data.remove(key);
        if value.is_some() {
            self.order.remove(key);
        }
        value
    }
}

/// Collects keys preserving first-seen order and dropping repeats.
fn dedup<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.filter(|key| seen.insert(*key))
        .map(str::to_string)
        .collect()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn seeded(config: CacheConfig, pairs: &[(&str, &str)]) -> CacheStore<String> {
        let items = pairs
            .iter()
            .map(|(k, v)| CacheItem::new(*k, v.to_string()))
            .collect();
        CacheStore::with_items(config, items)
    }

    fn item(key: &str, value: &str) -> CacheItem<String> {
        CacheItem::new(key, value.to_string())
    }

    #[test]
    fn test_store_new() {
        let store: CacheStore<String> = CacheStore::new(CacheConfig::default());
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_seed_emits_nothing() {
        let mut store = seeded(CacheConfig::default(), &[("key1", "value1")]);
        assert_eq!(store.len(), 1);
        assert!(store.take_events().is_empty());
        assert_eq!(store.stats("key1").unwrap(), Some(ItemStats { accesses: 0 }));
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(CacheConfig::default());

        store.set(item("key1", "value1")).unwrap();
        assert_eq!(store.get("key1").unwrap(), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store: CacheStore<String> = CacheStore::new(CacheConfig::default());

        assert_eq!(store.get("nonexistent").unwrap(), None);
        assert_eq!(
            store.take_events(),
            vec![CacheEvent::Get {
                key: "nonexistent".to_string(),
                value: None
            }]
        );
    }

    #[test]
    fn test_store_get_many_and_all() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2")],
        );

        let some = store.get_many(&["key1", "missing"]).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some["key1"], "value1");

        let all = store.get_many(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let keys: Vec<String> = store
            .take_events()
            .iter()
            .filter_map(|e| e.key().map(str::to_string))
            .collect();
        assert_eq!(keys, vec!["key1", "missing", "key1", "key2"]);
    }

    #[test]
    fn test_store_get_counts_accesses() {
        let mut store = seeded(CacheConfig::default(), &[("key1", "value1")]);

        store.get("key1").unwrap();
        store.get_many(&["key1", "nope"]).unwrap();

        assert_eq!(store.stats("key1").unwrap().unwrap().accesses, 2);
        assert_eq!(store.stats("nope").unwrap(), None);
    }

    #[test]
    fn test_store_error_on_miss_lists_all_keys_and_touches_nothing() {
        let config = CacheConfig::default().with_error_on_miss(true);
        let mut store = seeded(config, &[("key1", "value1")]);

        let err = store.get_many(&["key1", "a", "b"]).unwrap_err();
        assert_eq!(
            err,
            CacheError::MissingKeys(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(store.stats("key1").unwrap().unwrap().accesses, 0);
        assert!(store.take_events().is_empty());
    }

    #[test]
    fn test_store_overwrite_resets_stats() {
        let mut store = CacheStore::new(CacheConfig::default());

        store.set(item("key1", "value1")).unwrap();
        store.get("key1").unwrap();
        store.set(item("key1", "value2")).unwrap();

        assert_eq!(store.stats("key1").unwrap(), Some(ItemStats::new()));
        assert_eq!(store.get("key1").unwrap(), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_keeps_position() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2")],
        );
        store.set(item("key1", "value3")).unwrap();

        assert_eq!(store.keys(), vec!["key1", "key2"]);
        assert_eq!(store.values(), vec!["value3", "value2"]);
    }

    #[test]
    fn test_store_duplicate_check_aborts_batch() {
        let config = CacheConfig::default().with_error_on_duplicate(true);
        let mut store = seeded(config, &[("key1", "value1")]);

        let err = store
            .set_many(vec![item("key1", "value2"), item("key3", "value3")])
            .unwrap_err();

        assert_eq!(err, CacheError::DuplicateKeys(vec!["key1".to_string()]));
        assert!(!store.has("key3"));
        assert_eq!(store.get("key1").unwrap(), Some("value1".to_string()));
    }

    #[test]
    fn test_store_capacity_drops_overflow() {
        let config = CacheConfig::default().with_capacity(1);
        let mut store = CacheStore::new(config);

        store
            .set_many(vec![item("key1", "value1"), item("key2", "value2")])
            .unwrap();

        assert_eq!(store.keys(), vec!["key1"]);
        assert_eq!(store.take_events().len(), 1);
    }

    #[test]
    fn test_store_capacity_error_writes_nothing() {
        let config = CacheConfig::default()
            .with_capacity(1)
            .with_error_on_full(true);
        let mut store = CacheStore::new(config);

        let err = store
            .set_many(vec![item("key1", "value1"), item("key2", "value2")])
            .unwrap_err();

        assert_eq!(
            err,
            CacheError::CapacityExceeded {
                capacity: 1,
                requested: 2
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_capacity_allows_overwrite_when_full() {
        let config = CacheConfig::default()
            .with_capacity(1)
            .with_error_on_full(true);
        let mut store = seeded(config, &[("key1", "value1")]);

        store.set(item("key1", "value2")).unwrap();
        assert_eq!(store.get("key1").unwrap(), Some("value2".to_string()));
    }

    #[test]
    fn test_store_remove_and_remove_all() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2"), ("key3", "value3")],
        );

        store.remove_many(&["key2", "ghost"]).unwrap();
        assert_eq!(store.keys(), vec!["key1", "key3"]);
        assert_eq!(
            store.take_events(),
            vec![
                CacheEvent::Remove {
                    key: "key2".to_string(),
                    value: Some("value2".to_string())
                },
                CacheEvent::Remove {
                    key: "ghost".to_string(),
                    value: None
                },
            ]
        );

        store.remove_many(&[]).unwrap();
        assert!(store.is_empty());
        assert!(store.details("key1").is_none());
    }

    #[test]
    fn test_store_pop_twice() {
        let mut store = seeded(CacheConfig::default(), &[("key1", "value1")]);

        assert_eq!(store.pop("key1").unwrap(), Some("value1".to_string()));
        assert_eq!(store.pop("key1").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_pop_many() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2")],
        );

        let popped = store.pop_many(&[]).unwrap();
        assert_eq!(popped.len(), 2);
        assert!(store.is_empty());
        assert!(store
            .take_events()
            .iter()
            .all(|e| e.kind() == crate::cache::EventKind::Pop));
    }

    #[test]
    fn test_store_clear_drops_metadata() {
        let mut store = seeded(CacheConfig::default(), &[("key1", "value1")]);

        store.clear();
        assert!(store.is_empty());
        assert!(store.details("key1").is_none());
        assert!(store.keys().is_empty());
        assert_eq!(store.take_events(), vec![CacheEvent::Clear]);
    }

    #[test]
    fn test_store_stats_many_omits_absent() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2")],
        );
        store.get("key2").unwrap();

        let stats = store.stats_many(&["key2", "ghost"]).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["key2"].accesses, 1);
        assert_eq!(store.stats_many(&[]).unwrap().len(), 2);
    }

    #[test]
    fn test_store_clear_stats_selected_keys() {
        let mut store = seeded(
            CacheConfig::default(),
            &[("key1", "value1"), ("key2", "value2")],
        );
        store.get_many(&["key1", "key2"]).unwrap();

        store.clear_stats(&["key1"]).unwrap();
        assert_eq!(store.stats("key1").unwrap().unwrap().accesses, 0);
        assert_eq!(store.stats("key2").unwrap().unwrap().accesses, 1);

        store.clear_stats(&[]).unwrap();
        assert_eq!(store.stats("key2").unwrap().unwrap().accesses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweep_removes_elapsed() {
        let config = CacheConfig::default().with_default_ttl(5);
        let mut store = seeded(config, &[("key1", "value1")]);

        tokio::time::advance(Duration::from_millis(4000)).await;
        assert_eq!(store.sweep(), 0);
        assert!(store.has("key1"));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(store.sweep(), 1);
        assert!(!store.has("key1"));
        assert!(store.details("key1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweep_flags_once() {
        let config = CacheConfig::default()
            .with_default_ttl(1)
            .with_remove_on_expire(false)
            .with_expire_once(true);
        let mut store = seeded(config, &[("key1", "value1")]);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.sweep(), 0);
        assert!(store.is_expired("key1"));
        assert!(store.has("key1"));

        store.reset_expiry(&["key1"]).unwrap();
        assert!(!store.is_expired("key1"));
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sweep_refires_without_expire_once() {
        let config = CacheConfig::default()
            .with_default_ttl(1)
            .with_remove_on_expire(false)
            .with_expire_once(false);
        let mut store = seeded(config, &[("key1", "value1")]);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.take_events().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_set_ttl_keeps_time_added() {
        let mut store = seeded(CacheConfig::default(), &[("key1", "value1")]);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.sweep(), 0);

        store.set_ttl(2, &["key1"]).unwrap();
        assert_eq!(store.ttl_remaining("key1"), Some(Duration::ZERO));
        assert_eq!(store.sweep(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_is_silent() {
        let config = CacheConfig::default().with_remove_on_expire(false);
        let mut store = CacheStore::new(config);
        store
            .set_many(vec![
                item("short", "v").with_ttl(1),
                item("long", "v").with_ttl(100),
                item("forever", "v"),
            ])
            .unwrap();
        store.take_events();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge(), 1);
        assert_eq!(store.keys(), vec!["long", "forever"]);
        assert!(store.take_events().is_empty());
    }

    #[test]
    fn test_store_entries_in_insertion_order() {
        let mut store = CacheStore::new(CacheConfig::default());
        store.set(item("key1", "value1")).unwrap();
        store.set(item("key2", "value2")).unwrap();
        store.get("key2").unwrap();

        assert_eq!(
            store.entries(),
            vec![
                ("key1".to_string(), "value1".to_string()),
                ("key2".to_string(), "value2".to_string())
            ]
        );
    }
}
