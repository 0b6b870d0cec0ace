//! Configuration Module
//!
//! Cache policy settings, partial updates, and loading from environment variables.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cache policy configuration.
///
/// Replaced as a whole on every update; see [`CacheConfig::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Seconds between expiry sweeps, 0 disables the sweep
    pub interval: u64,
    /// TTL in seconds for items without their own, 0 = never expires
    pub default_ttl: u64,
    /// Evict expired items (true) or keep them flagged as expired (false)
    pub remove_on_expire: bool,
    /// Report a flagged item only once instead of on every sweep
    pub expire_once: bool,
    /// Maximum number of live keys, None = unbounded
    pub capacity: Option<usize>,
    /// Reject a whole `set` batch that would exceed capacity
    pub error_on_full: bool,
    /// Reject operations that reference absent keys
    pub error_on_miss: bool,
    /// Reject `set` batches that target existing keys
    pub error_on_duplicate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            interval: 1,
            default_ttl: 0,
            remove_on_expire: true,
            expire_once: true,
            capacity: None,
            error_on_full: false,
            error_on_miss: false,
            error_on_duplicate: false,
        }
    }
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_INTERVAL` - Sweep interval in seconds (default: 1)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 0)
    /// - `CACHE_REMOVE_ON_EXPIRE` - Evict on expiry (default: true)
    /// - `CACHE_EXPIRE_ONCE` - Report expiry once (default: true)
    /// - `CACHE_CAPACITY` - Maximum live keys (default: unbounded)
    /// - `CACHE_ERROR_ON_FULL` - (default: false)
    /// - `CACHE_ERROR_ON_MISS` - (default: false)
    /// - `CACHE_ERROR_ON_DUPLICATE` - (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            interval: parse_var(&lookup, "CACHE_INTERVAL").unwrap_or(defaults.interval),
            default_ttl: parse_var(&lookup, "CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            remove_on_expire: bool_var(&lookup, "CACHE_REMOVE_ON_EXPIRE")
                .unwrap_or(defaults.remove_on_expire),
            expire_once: bool_var(&lookup, "CACHE_EXPIRE_ONCE").unwrap_or(defaults.expire_once),
            capacity: parse_var(&lookup, "CACHE_CAPACITY").or(defaults.capacity),
            error_on_full: bool_var(&lookup, "CACHE_ERROR_ON_FULL")
                .unwrap_or(defaults.error_on_full),
            error_on_miss: bool_var(&lookup, "CACHE_ERROR_ON_MISS")
                .unwrap_or(defaults.error_on_miss),
            error_on_duplicate: bool_var(&lookup, "CACHE_ERROR_ON_DUPLICATE")
                .unwrap_or(defaults.error_on_duplicate),
        }
    }

    /// Shallow-merges the fields present in `update` into this config.
    pub fn merge(&self, update: &ConfigUpdate) -> Self {
        Self {
            interval: update.interval.unwrap_or(self.interval),
            default_ttl: update.default_ttl.unwrap_or(self.default_ttl),
            remove_on_expire: update.remove_on_expire.unwrap_or(self.remove_on_expire),
            expire_once: update.expire_once.unwrap_or(self.expire_once),
            capacity: update.capacity.unwrap_or(self.capacity),
            error_on_full: update.error_on_full.unwrap_or(self.error_on_full),
            error_on_miss: update.error_on_miss.unwrap_or(self.error_on_miss),
            error_on_duplicate: update
                .error_on_duplicate
                .unwrap_or(self.error_on_duplicate),
        }
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval = secs;
        self
    }

    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = secs;
        self
    }

    pub fn with_remove_on_expire(mut self, remove: bool) -> Self {
        self.remove_on_expire = remove;
        self
    }

    pub fn with_expire_once(mut self, once: bool) -> Self {
        self.expire_once = once;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_error_on_full(mut self, error: bool) -> Self {
        self.error_on_full = error;
        self
    }

    pub fn with_error_on_miss(mut self, error: bool) -> Self {
        self.error_on_miss = error;
        self
    }

    pub fn with_error_on_duplicate(mut self, error: bool) -> Self {
        self.error_on_duplicate = error;
        self
    }
}

/// A partial configuration; only `Some` fields are applied.
///
/// `capacity` is doubly optional so an update can lift the limit with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub interval: Option<u64>,
    pub default_ttl: Option<u64>,
    pub remove_on_expire: Option<bool>,
    pub expire_once: Option<bool>,
    pub capacity: Option<Option<usize>>,
    pub error_on_full: Option<bool>,
    pub error_on_miss: Option<bool>,
    pub error_on_duplicate: Option<bool>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, secs: u64) -> Self {
        self.interval = Some(secs);
        self
    }

    pub fn default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = Some(secs);
        self
    }

    pub fn remove_on_expire(mut self, remove: bool) -> Self {
        self.remove_on_expire = Some(remove);
        self
    }

    pub fn expire_once(mut self, once: bool) -> Self {
        self.expire_once = Some(once);
        self
    }

    pub fn capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn error_on_full(mut self, error: bool) -> Self {
        self.error_on_full = Some(error);
        self
    }

    pub fn error_on_miss(mut self, error: bool) -> Self {
        self.error_on_miss = Some(error);
        self
    }

    pub fn error_on_duplicate(mut self, error: bool) -> Self {
        self.error_on_duplicate = Some(error);
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn bool_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    match lookup(name)?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.interval, 1);
        assert_eq!(config.default_ttl, 0);
        assert!(config.remove_on_expire);
        assert!(config.expire_once);
        assert_eq!(config.capacity, None);
        assert!(!config.error_on_full);
        assert!(!config.error_on_miss);
        assert!(!config.error_on_duplicate);
    }

    #[test]
    fn test_config_from_lookup_defaults() {
        let config = CacheConfig::from_lookup(|_| None);
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_config_from_lookup_values() {
        let vars: HashMap<&str, &str> = [
            ("CACHE_INTERVAL", "5"),
            ("CACHE_DEFAULT_TTL", "60"),
            ("CACHE_REMOVE_ON_EXPIRE", "false"),
            ("CACHE_CAPACITY", "10"),
            ("CACHE_ERROR_ON_MISS", "yes"),
            ("CACHE_EXPIRE_ONCE", "garbage"),
        ]
        .into_iter()
        .collect();

        let config = CacheConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.interval, 5);
        assert_eq!(config.default_ttl, 60);
        assert!(!config.remove_on_expire);
        assert_eq!(config.capacity, Some(10));
        assert!(config.error_on_miss);
        // Unparsable values fall back to the default
        assert!(config.expire_once);
    }

    #[test]
    fn test_merge_only_touches_given_fields() {
        let base = CacheConfig::default().with_capacity(3).with_default_ttl(10);
        let merged = base.merge(&ConfigUpdate::new().interval(0).error_on_full(true));

        assert_eq!(merged.interval, 0);
        assert!(merged.error_on_full);
        assert_eq!(merged.capacity, Some(3));
        assert_eq!(merged.default_ttl, 10);
    }

    #[test]
    fn test_merge_can_lift_capacity() {
        let base = CacheConfig::default().with_capacity(3);
        let merged = base.merge(&ConfigUpdate::new().capacity(None));
        assert_eq!(merged.capacity, None);
    }

    #[test]
    fn test_config_deserializes_camel_case_with_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"defaultTtl":5,"errorOnDuplicate":true}"#).unwrap();
        assert_eq!(config.default_ttl, 5);
        assert!(config.error_on_duplicate);
        assert_eq!(config.interval, 1);
    }
}
