//! Cache Handle Module
//!
//! Thread-safe facade over [`CacheStore`] that owns the expiry scheduler and
//! the observer registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use parking_lot::ReentrantMutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{
    CacheEvent, CacheItem, CacheStore, EventKind, ItemDetails, ItemStats, Observers,
    SubscriptionId,
};
use crate::config::{CacheConfig, ConfigUpdate};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_expiry_task;

/// Store state guarded by a single lock.
struct State<V> {
    store: CacheStore<V>,
    /// Bumped every time the scheduler is re-armed; stale ticks compare against it
    generation: u64,
    scheduler: Option<JoinHandle<()>>,
    /// Runtime the sweep is spawned on, captured when first available
    runtime: Option<Handle>,
}

/// State shared between a [`Cache`] and its expiry task.
pub(crate) struct Shared<V> {
    /// Held across a call's mutation and the delivery of its events.
    /// Re-entrant so observers can call back into the cache on the same thread.
    gate: ReentrantMutex<()>,
    state: Mutex<State<V>>,
    observers: Mutex<Observers<V>>,
}

impl<V> Shared<V> {
    // Observers never run under this lock, so a poisoned guard only means an
    // unrelated panic and the data is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Observers<V>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers events to their observers in order, on the calling thread.
    fn publish(&self, events: Vec<CacheEvent<V>>) {
        for event in events {
            let listeners = self.lock_observers().listeners(event.kind());
            for listener in listeners {
                listener(&event);
            }
        }
    }
}

impl<V: Clone> Shared<V> {
    /// Runs one sweep on behalf of the scheduler armed at `generation`.
    ///
    /// Returns None when that scheduler has been superseded.
    pub(crate) fn run_sweep(&self, generation: u64) -> Option<usize> {
        let _gate = self.gate.lock();
        let (expired, events) = {
            let mut state = self.lock_state();
            if state.generation != generation {
                return None;
            }
            let expired = state.store.sweep();
            (expired, state.store.take_events())
        };
        self.publish(events);
        Some(expired)
    }
}

// == Cache ==
/// An in-process key/value cache with TTL expiry, access stats and events.
///
/// Calls that emit events are serialized with their delivery: observers see
/// events in the order the state changed, across threads and sweep ticks.
/// Delivery happens on the calling thread before the call returns, and
/// observers may call back into the cache. An observer must not wait on
/// another thread that uses the same cache.
///
/// A non-zero `interval` requires a Tokio runtime: the periodic sweep runs
/// as a task on it. Dropping the cache cancels that task.
///
/// # Example
/// ```
/// use event_cache::{Cache, CacheConfig, CacheItem};
///
/// let cache = Cache::new(CacheConfig::default().with_interval(0)).unwrap();
/// cache.set(CacheItem::new("key1", 42)).unwrap();
/// assert_eq!(cache.get("key1").unwrap(), Some(42));
/// ```
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_items(config, Vec::new())
    }

    /// Creates a cache seeded with `items` (no events, no policy checks).
    pub fn with_items(config: CacheConfig, items: Vec<CacheItem<V>>) -> Result<Self> {
        let captured = Handle::try_current().ok();
        let runtime = runtime_for(&config, captured.as_ref())?;
        let shared = Arc::new(Shared {
            gate: ReentrantMutex::new(()),
            state: Mutex::new(State {
                store: CacheStore::with_items(config, items),
                generation: 0,
                scheduler: None,
                runtime: captured,
            }),
            observers: Mutex::new(Observers::new()),
        });

        {
            let mut state = shared.lock_state();
            arm_scheduler(&shared, &mut state, runtime);
        }
        Ok(Self { shared })
    }

    // == Config ==
    /// Merges `update` into the active config and restarts the sweep with it.
    ///
    /// The sweep runs on the runtime the cache was built in, so this may be
    /// called from any thread. Fails with [`CacheError::NoRuntime`], leaving
    /// the config unchanged, if the merged interval is non-zero and no
    /// runtime was ever available.
    pub fn config(&self, update: ConfigUpdate) -> Result<()> {
        let mut state = self.shared.lock_state();
        let merged = state.store.config().merge(&update);
        let runtime = runtime_for(&merged, state.runtime.as_ref())?;

        debug!("Applying config update: {:?}", update);
        if state.runtime.is_none() {
            state.runtime = runtime.clone();
        }
        state.store.set_config(merged);
        arm_scheduler(&self.shared, &mut state, runtime);
        Ok(())
    }

    /// Returns a copy of the active config.
    pub fn current_config(&self) -> CacheConfig {
        self.shared.lock_state().store.config().clone()
    }

    /// Whether a periodic sweep is currently armed.
    pub fn is_sweeping(&self) -> bool {
        self.shared
            .lock_state()
            .scheduler
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Observers ==
    /// Registers `observer` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, observer: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent<V>) + Send + Sync + 'static,
    {
        let mut observers = self.shared.lock_observers();
        let id = observers.subscribe(kind, Arc::new(observer));
        debug!("Observer subscribed to {} ({} registered)", kind, observers.len());
        id
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.shared.lock_observers();
        let removed = observers.unsubscribe(id);
        if removed {
            debug!("Observer unsubscribed ({} registered)", observers.len());
        }
        removed
    }

    // == Reads ==
    /// Reads one key. Emits a `get` event even when the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        self.with_store(|store| store.get(key))
    }

    /// Reads several keys, or every key when `keys` is empty.
    pub fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, V>> {
        self.with_store(|store| store.get_many(keys))
    }

    // == Writes ==
    /// Stores one item, overwriting any existing value and metadata.
    pub fn set(&self, item: CacheItem<V>) -> Result<()> {
        self.with_store(|store| store.set(item))
    }

    /// Stores a batch of items in order.
    pub fn set_many(&self, items: Vec<CacheItem<V>>) -> Result<()> {
        self.with_store(|store| store.set_many(items))
    }

    /// Removes one key.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.with_store(|store| store.remove_many(&[key]))
    }

    /// Removes several keys, or every key when `keys` is empty.
    pub fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.with_store(|store| store.remove_many(keys))
    }

    /// Reads and removes one key.
    pub fn pop(&self, key: &str) -> Result<Option<V>> {
        self.with_store(|store| store.pop(key))
    }

    /// Reads and removes several keys, or every key when `keys` is empty.
    pub fn pop_many(&self, keys: &[&str]) -> Result<HashMap<String, V>> {
        self.with_store(|store| store.pop_many(keys))
    }

    /// Drops everything and emits a single `clear` event.
    pub fn clear(&self) {
        self.with_store(|store| store.clear())
    }

    // == Introspection ==
    pub fn has(&self, key: &str) -> bool {
        self.shared.lock_state().store.has(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.shared.lock_state().store.keys()
    }

    pub fn values(&self) -> Vec<V> {
        self.shared.lock_state().store.values()
    }

    pub fn entries(&self) -> Vec<(String, V)> {
        self.shared.lock_state().store.entries()
    }

    pub fn size(&self) -> usize {
        self.shared.lock_state().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock_state().store.is_empty()
    }

    pub fn details(&self, key: &str) -> Option<ItemDetails> {
        self.shared.lock_state().store.details(key)
    }

    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.shared.lock_state().store.ttl_remaining(key)
    }

    pub fn is_expired(&self, key: &str) -> bool {
        self.shared.lock_state().store.is_expired(key)
    }

    // == Stats ==
    pub fn stats(&self, key: &str) -> Result<Option<ItemStats>> {
        self.shared.lock_state().store.stats(key)
    }

    pub fn stats_many(&self, keys: &[&str]) -> Result<HashMap<String, ItemStats>> {
        self.shared.lock_state().store.stats_many(keys)
    }

    pub fn clear_stats(&self, keys: &[&str]) -> Result<()> {
        self.with_store(|store| store.clear_stats(keys))
    }

    // == Expiry ==
    /// Overwrites the TTL (seconds) of the given keys, or all keys when empty.
    pub fn ttl(&self, ttl: u64, keys: &[&str]) -> Result<()> {
        self.with_store(|store| store.set_ttl(ttl, keys))
    }

    /// Restarts the TTL countdown of the given keys, or all keys when empty.
    pub fn reset_expiry(&self, keys: &[&str]) -> Result<()> {
        self.with_store(|store| store.reset_expiry(keys))
    }

    /// Evicts every elapsed item immediately, without `expire` events.
    pub fn purge(&self) -> usize {
        self.with_store(|store| store.purge())
    }

    /// Runs `op` under the lock, then publishes whatever it emitted before
    /// another emitting call can start.
    fn with_store<T>(&self, op: impl FnOnce(&mut CacheStore<V>) -> T) -> T {
        let _gate = self.shared.gate.lock();
        let (result, events) = {
            let mut state = self.shared.lock_state();
            let result = op(&mut state.store);
            (result, state.store.take_events())
        };
        self.shared.publish(events);
        result
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        if let Some(handle) = state.scheduler.take() {
            handle.abort();
            debug!("Expiry sweep cancelled on drop");
        }
    }
}

/// Runtime to host the sweep, None when the sweep is disabled.
///
/// Prefers the `captured` runtime over the caller's current one.
fn runtime_for(config: &CacheConfig, captured: Option<&Handle>) -> Result<Option<Handle>> {
    if config.interval == 0 {
        return Ok(None);
    }
    captured
        .cloned()
        .or_else(|| Handle::try_current().ok())
        .map(Some)
        .ok_or(CacheError::NoRuntime)
}

/// Cancels the running sweep and, if `runtime` is given, starts a fresh one.
///
/// Called with the state lock held, so no tick of the old task can run after
/// the generation is bumped.
fn arm_scheduler<V>(shared: &Arc<Shared<V>>, state: &mut State<V>, runtime: Option<Handle>)
where
    V: Clone + Send + 'static,
{
    state.generation += 1;
    if let Some(handle) = state.scheduler.take() {
        handle.abort();
    }

    match runtime {
        Some(runtime) => {
            let period = Duration::from_secs(state.store.config().interval);
            state.scheduler = Some(spawn_expiry_task(
                &runtime,
                Arc::downgrade(shared),
                period,
                state.generation,
            ));
            info!("Expiry sweep armed every {:?}", period);
        }
        None => debug!("Expiry sweep disabled"),
    }
}
