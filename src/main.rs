//! Event Cache demo host
//!
//! Builds a cache from environment configuration, optionally seeds it from a
//! JSON file, logs every lifecycle event and runs until interrupted.

use std::env;
use std::fs;

use anyhow::Context;
use serde_json::Value;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_cache::{Cache, CacheConfig, CacheEvent, CacheItem, EventKind};

/// Entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Load seed items from `CACHE_SEED_FILE`, if set
/// 4. Create the cache (arms the expiry sweep)
/// 5. Subscribe a logging observer to every event kind
/// 6. Wait for SIGINT/SIGTERM, then drop the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Event Cache");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: interval={}s, default_ttl={}s, capacity={:?}, remove_on_expire={}, expire_once={}",
        config.interval,
        config.default_ttl,
        config.capacity,
        config.remove_on_expire,
        config.expire_once
    );

    let items = load_seed_items()?;
    info!("Seeding cache with {} items", items.len());

    let cache: Cache<Value> = Cache::with_items(config, items)?;
    for kind in EventKind::ALL {
        cache.subscribe(kind, log_event);
    }
    info!("Cache ready with {} items", cache.size());

    shutdown_signal().await;

    drop(cache);
    warn!("Cache dropped, expiry sweep cancelled");
    info!("Shutdown complete");
    Ok(())
}

/// Reads a JSON array of `{key, value, ttl?}` from `CACHE_SEED_FILE`.
fn load_seed_items() -> anyhow::Result<Vec<CacheItem<Value>>> {
    let Ok(path) = env::var("CACHE_SEED_FILE") else {
        return Ok(Vec::new());
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read seed file {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path))
}

fn log_event(event: &CacheEvent<Value>) {
    match event {
        CacheEvent::Clear => info!(event = %event.kind(), "cache cleared"),
        _ => info!(
            event = %event.kind(),
            key = event.key().unwrap_or_default(),
            value = ?event.value(),
            "cache event"
        ),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
