//! Cache-aware preferences client.
//!
//! DESIGN
//! ======
//! Composes a [`RemoteSyncClient`] with a [`TtlCache`]; the cache is only
//! touched after the remote layer has answered, so a failed call never
//! disturbs what is already cached.
//!
//! - preferences: offline short-circuit, then cache, then network
//! - available themes: cache, then network, then the built-in set
//! - theme switch: never cached

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::SyncResult;
use super::cache::TtlCache;
use super::remote::RemoteSyncClient;
use crate::error::SyncError;
use crate::ports::Clock;
use crate::theme::{AvailableThemes, ThemeName, ThemePreferences, ThemeSwitch};

pub const PREFERENCES_KEY: &str = "preferences";
pub const AVAILABLE_THEMES_KEY: &str = "available-themes";
pub const LAST_SYNC_KEY: &str = "last-sync";

#[cfg(test)]
#[path = "cached_test.rs"]
mod tests;

pub struct CachedSyncClient {
    remote: RemoteSyncClient,
    cache: TtlCache,
    clock: Arc<dyn Clock>,
}

impl CachedSyncClient {
    #[must_use]
    pub fn new(remote: RemoteSyncClient, cache: TtlCache, clock: Arc<dyn Clock>) -> Self {
        Self { remote, cache, clock }
    }

    #[must_use]
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.remote.is_online()
    }

    pub async fn get_preferences(&self, force_refresh: bool) -> SyncResult<ThemePreferences> {
        if !self.remote.is_online() {
            return SyncResult::failure(&SyncError::Offline);
        }

        if !force_refresh {
            if let Some(prefs) = self.cache.get::<ThemePreferences>(PREFERENCES_KEY) {
                debug!("preferences served from cache");
                return SyncResult::cached(prefs);
            }
        }

        let result = self.remote.get_preferences().await;
        if let Some(prefs) = result.data.as_ref().filter(|_| result.success) {
            self.cache.set(PREFERENCES_KEY, prefs);
        }
        result
    }

    /// Push `prefs`; on success the input is written through to the cache.
    pub async fn update_preferences(&self, prefs: &ThemePreferences) -> SyncResult<Value> {
        let result = self.remote.update_preferences(prefs).await;
        if result.success {
            self.cache.set(PREFERENCES_KEY, prefs);
        }
        result
    }

    pub async fn switch_theme(&self, theme: ThemeName) -> SyncResult<ThemeSwitch> {
        self.remote.switch_theme(theme).await
    }

    pub async fn get_available_themes(&self) -> SyncResult<AvailableThemes> {
        if let Some(themes) = self.cache.get::<AvailableThemes>(AVAILABLE_THEMES_KEY) {
            return SyncResult::cached(themes);
        }

        let result = self.remote.get_available_themes().await;
        if result.success {
            if let Some(themes) = &result.data {
                self.cache.set(AVAILABLE_THEMES_KEY, themes);
            }
        }
        result
    }

    /// Reconcile with the server; a server answer also refreshes the cache
    /// and the last-sync stamp.
    pub async fn sync_preferences(&self, local: &ThemePreferences) -> SyncResult<ThemePreferences> {
        let result = self.remote.sync_preferences(local).await;
        if result.source == Some(super::DataSource::Server) {
            if let Some(merged) = &result.data {
                self.cache.set(PREFERENCES_KEY, merged);
                self.cache.set(LAST_SYNC_KEY, &self.clock.now_millis());
            }
        }
        result
    }

    /// Epoch milliseconds of the last server reconcile, while still cached.
    #[must_use]
    pub fn last_sync(&self) -> Option<u64> {
        self.cache.get(LAST_SYNC_KEY)
    }
}
