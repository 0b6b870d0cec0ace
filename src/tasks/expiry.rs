//! Expiry Sweep Task
//!
//! Background task that periodically expires cache items.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Shared;

/// Spawns a task that sweeps the cache every `period`.
///
/// The task holds only a weak reference, so it ends on its own once the
/// cache is dropped. It also ends on the first tick after a newer scheduler
/// has been armed (its `generation` no longer matches).
///
/// # Arguments
/// * `runtime` - Runtime to spawn onto
/// * `cache` - Weak reference to the cache state
/// * `period` - Interval between sweeps
/// * `generation` - Scheduler generation this task belongs to
///
/// # Returns
/// A JoinHandle the cache keeps so it can abort the task on reconfiguration
/// or drop.
pub(crate) fn spawn_expiry_task<V>(
    runtime: &Handle,
    cache: Weak<Shared<V>>,
    period: Duration,
    generation: u64,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    // First tick is one full period after arming, not after first poll
    let start = Instant::now() + period;

    runtime.spawn(async move {
        debug!(
            "Starting expiry sweep (generation {}) every {:?}",
            generation, period
        );

        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping expiry sweep");
                break;
            };

            match cache.run_sweep(generation) {
                Some(0) => debug!("Expiry sweep: no expired items found"),
                Some(expired) => info!("Expiry sweep: expired {} items", expired),
                None => {
                    debug!("Expiry sweep generation {} superseded", generation);
                    break;
                }
            }
        }
    })
}
