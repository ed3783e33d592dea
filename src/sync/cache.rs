//! TTL cache of timestamped entries over a `StoragePort`.
//!
//! DESIGN
//! ======
//! Every entry is stored as `{ "data": ..., "timestamp": <epoch ms> }` under
//! a `theme-cache:` prefixed key. Reads evict eagerly: an entry that is
//! expired, stamped in the future, or does not parse is deleted on the read
//! that discovers it, so staleness never outlives one lookup.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures are logged and treated as a miss (reads) or a no-op
//! (writes). Callers never see a storage error from this layer.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ports::{Clock, StoragePort};

pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const CACHE_PREFIX: &str = "theme-cache:";

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    timestamp: u64,
}

pub struct TtlCache {
    storage: Arc<dyn StoragePort>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TtlCache {
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(storage, clock, CACHE_TTL)
    }

    #[must_use]
    pub fn with_ttl(storage: Arc<dyn StoragePort>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { storage, clock, ttl }
    }

    fn storage_key(key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    /// Fresh cached value for `key`, or `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = Self::storage_key(key);
        let raw = match self.storage.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, key, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, key, "malformed cache entry; evicting");
                self.evict(&storage_key);
                return None;
            }
        };

        let Some(age_ms) = self.clock.now_millis().checked_sub(entry.timestamp) else {
            warn!(key, timestamp = entry.timestamp, "cache entry stamped in the future; evicting");
            self.evict(&storage_key);
            return None;
        };
        if u128::from(age_ms) > self.ttl.as_millis() {
            debug!(key, age_ms, "cache entry expired; evicting");
            self.evict(&storage_key);
            return None;
        }

        Some(entry.data)
    }

    /// Store `value` stamped with the current time.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let entry = CacheEntry { data: value, timestamp: self.clock.now_millis() };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key, "cache entry serialization failed");
                return;
            }
        };
        if let Err(e) = self.storage.set(&Self::storage_key(key), &raw) {
            warn!(error = %e, key, "cache write failed");
        }
    }

    pub fn remove(&self, key: &str) {
        self.evict(&Self::storage_key(key));
    }

    /// Remove every cache entry, leaving unrelated keys alone.
    pub fn clear_all(&self) {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache clear failed to list keys");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            self.evict(key);
        }
    }

    fn evict(&self, storage_key: &str) {
        if let Err(e) = self.storage.remove(storage_key) {
            warn!(error = %e, key = storage_key, "cache eviction failed");
        }
    }
}
