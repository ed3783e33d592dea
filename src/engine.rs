//! Preference engine wiring the store, transitions, sync, and status.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host talks to one `PreferenceEngine`. Local changes commit through
//! `ThemeStore` (animated by `TransitionCoordinator`) and return as soon as
//! they are persisted; the remote push runs in a spawned task with retry and
//! reports through `SyncStatusTracker`.
//!
//! DESIGN
//! ======
//! - user-visible calls (`set_theme`, `sync_now`, ...) retry with backoff
//!   and drive the sync status
//! - the reconcile spawned by `initialize` and by reconnects is passive:
//!   one attempt, no status changes
//! - a server-won theme from a reconcile is applied locally only while local
//!   state is clean: no commit landed during the reconcile and every commit
//!   has been confirmed by a push. Otherwise local wins and is pushed again
//! - pushes share one slot; a newer push aborts the one still retrying
//! - auto-switch is an engine setting; when on, system theme changes are
//!   turned into `set_theme` calls here, never inside the store
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns an error. Failures degrade to local state and are
//! visible through logs and `SyncStatus`.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::ports::{Clock, DocumentPort, EnvironmentProbe, NetworkPort, StoragePort, ViewTransitionPort};
use crate::shutdown::Shutdown;
use crate::sync::cache::TtlCache;
use crate::sync::cached::CachedSyncClient;
use crate::sync::remote::RemoteSyncClient;
use crate::sync::retry::{RetryCoordinator, RetryError};
use crate::sync::status::{SyncStatus, SyncStatusTracker};
use crate::sync::{DataSource, SyncResult};
use crate::theme::store::{ThemeAction, ThemeStore};
use crate::theme::transition::TransitionCoordinator;
use crate::theme::{AccessibilityFlags, AvailableThemes, ThemeName, ThemePreferences, ThemeState};

pub const PREFERENCES_STORAGE_KEY: &str = "preferred-theme-preferences";

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;

/// Host capabilities the engine is built on.
#[derive(Clone)]
pub struct EnginePorts {
    pub storage: Arc<dyn StoragePort>,
    pub network: Arc<dyn NetworkPort>,
    pub document: Arc<dyn DocumentPort>,
    pub environment: Arc<dyn EnvironmentProbe>,
    pub clock: Arc<dyn Clock>,
    pub view_transition: Option<Arc<dyn ViewTransitionPort>>,
}

/// Preference fields owned by the engine rather than the store.
#[derive(Debug, Clone, Copy, Default)]
struct EngineSettings {
    auto_switch: bool,
    last_synced: Option<u64>,
}

struct EngineInner {
    store: ThemeStore,
    transitions: TransitionCoordinator,
    sync: CachedSyncClient,
    retry: RetryCoordinator,
    status: SyncStatusTracker,
    storage: Arc<dyn StoragePort>,
    settings: Mutex<EngineSettings>,
    initialized: AtomicBool,
    /// Bumped by every local commit.
    local_generation: AtomicU64,
    /// Newest local generation the server has acknowledged.
    pushed_generation: AtomicU64,
    push_slot: Mutex<Option<AbortHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Shutdown,
}

#[derive(Clone)]
pub struct PreferenceEngine {
    inner: Arc<EngineInner>,
}

impl PreferenceEngine {
    #[must_use]
    pub fn new(ports: EnginePorts, config: &SyncConfig) -> Self {
        let shutdown = Shutdown::new();
        let store =
            ThemeStore::new(ports.storage.clone(), ports.document.clone(), ports.environment, config.default_theme);
        let transitions = TransitionCoordinator::new(
            ports.document,
            ports.view_transition,
            config.transition_config(),
            shutdown.clone(),
        );
        let remote = RemoteSyncClient::new(ports.network, ports.clock.clone());
        let cache = TtlCache::new(ports.storage.clone(), ports.clock.clone());
        let sync = CachedSyncClient::new(remote, cache, ports.clock);

        let inner = EngineInner {
            store,
            transitions,
            sync,
            retry: RetryCoordinator::with_shutdown(config.retry_policy(), shutdown.clone()),
            status: SyncStatusTracker::new(shutdown.clone()),
            storage: ports.storage,
            settings: Mutex::new(EngineSettings::default()),
            initialized: AtomicBool::new(false),
            local_generation: AtomicU64::new(0),
            pushed_generation: AtomicU64::new(0),
            push_slot: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown,
        };
        Self { inner: Arc::new(inner) }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Hydrate local state, then reconcile with the server in the background.
    /// Runs once; later calls return the current snapshot.
    pub fn initialize(&self) -> ThemeState {
        let inner = &self.inner;
        if inner.initialized.swap(true, Ordering::SeqCst) {
            return inner.store.state();
        }
        let mut state = inner.store.initialize();
        if let Some(saved) = inner.load_preferences() {
            inner.update_settings(|s| {
                s.auto_switch = saved.auto_switch;
                s.last_synced = saved.last_synced;
            });
        }

        if inner.settings().auto_switch && state.current_theme != state.system_theme {
            info!(theme = %state.system_theme, "auto-switch: following system theme");
            state = inner.store.set_theme(state.system_theme);
        }

        let background = inner.clone();
        inner.spawn(async move {
            background.reconcile().await;
        });
        state
    }

    /// Wait for every spawned sync task to finish.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> =
                std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    if e.is_panic() {
                        warn!(error = %e, "sync task panicked");
                    }
                }
            }
        }
    }

    /// Teardown: cancel retry, transition, and status timers and abort
    /// spawned sync tasks. Nothing fires afterwards.
    pub fn shutdown(&self) {
        info!("preference engine shutting down");
        self.inner.shutdown.trigger();
        self.inner.status.shutdown();
        for task in self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
    }

    // =========================================================================
    // LOCAL CHANGES
    // =========================================================================

    /// Commit, persist, and apply `theme`, then push it to the server in the
    /// background.
    pub async fn set_theme(&self, theme: ThemeName) -> ThemeState {
        let (state, generation) = self.commit_theme(theme).await;
        self.inner.spawn_push(generation, "switch theme", move |inner| async move {
            inner.sync.switch_theme(theme).await.into_result()
        });
        state
    }

    /// Animated local commit. A busy or torn-down coordinator still gets
    /// the commit, just without animation.
    async fn commit_theme(&self, theme: ThemeName) -> (ThemeState, u64) {
        let inner = &self.inner;
        let reduce_motion = inner.store.state().accessibility.prefers_reduced_motion;
        let committed = AtomicBool::new(false);

        let outcome = inner
            .transitions
            .execute(reduce_motion, || {
                inner.store.set_theme(theme);
                committed.store(true, Ordering::SeqCst);
            })
            .await;
        if !committed.load(Ordering::SeqCst) {
            debug!(?outcome, %theme, "transition skipped; committing directly");
            inner.store.set_theme(theme);
        }

        let generation = inner.mark_local_change();
        inner.save_preferences();
        (inner.store.state(), generation)
    }

    pub async fn toggle_theme(&self) -> ThemeState {
        let target = self.inner.store.state().current_theme.opposite();
        self.set_theme(target).await
    }

    /// Set a raw theme name. Unknown names are ignored.
    pub async fn set_theme_str(&self, raw: &str) -> Option<ThemeState> {
        match raw.parse::<ThemeName>() {
            Ok(theme) => Some(self.set_theme(theme).await),
            Err(e) => {
                debug!(error = %e, "theme change rejected");
                None
            }
        }
    }

    /// Turn system-theme following on or off. Enabling it applies the
    /// current system theme right away.
    pub async fn set_auto_switch(&self, enabled: bool) -> ThemeState {
        self.inner.update_settings(|s| s.auto_switch = enabled);
        info!(enabled, "auto-switch updated");
        let (state, generation) = if enabled {
            self.commit_theme(self.inner.store.state().system_theme).await
        } else {
            let generation = self.inner.mark_local_change();
            self.inner.save_preferences();
            (self.inner.store.state(), generation)
        };
        self.inner.spawn_preferences_push(generation);
        state
    }

    /// Apply the current system theme.
    pub async fn follow_system_theme(&self) -> ThemeState {
        let system = self.inner.store.state().system_theme;
        self.set_theme(system).await
    }

    // =========================================================================
    // ENVIRONMENT SIGNALS
    // =========================================================================

    pub async fn on_system_theme_changed(&self, theme: ThemeName) -> ThemeState {
        let state = self.inner.store.dispatch(ThemeAction::SetSystemTheme(theme));
        if self.inner.settings().auto_switch && state.current_theme != theme {
            return self.set_theme(theme).await;
        }
        state
    }

    pub fn on_accessibility_changed(&self, flags: AccessibilityFlags) -> ThemeState {
        let state = self.inner.store.dispatch(ThemeAction::SetAccessibility(flags));
        self.inner.save_preferences();
        state
    }

    /// The host's connectivity changed; reconnecting triggers a passive
    /// reconcile.
    pub fn on_online_changed(&self, online: bool) {
        info!(online, "connectivity changed");
        if online {
            let background = self.inner.clone();
            self.inner.spawn(async move {
                background.reconcile().await;
            });
        }
    }

    // =========================================================================
    // REMOTE
    // =========================================================================

    /// User-initiated full reconcile with retry.
    pub async fn sync_now(&self) -> SyncResult<ThemePreferences> {
        let inner = &self.inner;
        let since = inner.local_generation();
        let local = inner.current_preferences();
        if !inner.sync.is_online() {
            inner.status.set(SyncStatus::Error);
            return SyncResult::local_fallback(local);
        }

        inner.status.set(SyncStatus::Syncing);
        let result = inner
            .retry
            .run(|| {
                let inner = inner.clone();
                async move {
                    let result = inner.sync.sync_preferences(&inner.current_preferences()).await;
                    if result.source == Some(DataSource::Server) {
                        Ok(result)
                    } else {
                        Err("server unavailable")
                    }
                }
            })
            .await;

        match result {
            Ok(result) => {
                if let Some(merged) = &result.data {
                    inner.adopt(merged, since);
                }
                inner.status.set(SyncStatus::Success);
                result
            }
            Err(e) => {
                warn!(error = %e, "sync failed; keeping local preferences");
                inner.status.set(SyncStatus::Error);
                SyncResult::local_fallback(local)
            }
        }
    }

    /// Server preferences, cache-first unless `force_refresh`.
    pub async fn remote_preferences(&self, force_refresh: bool) -> SyncResult<ThemePreferences> {
        let inner = &self.inner;
        if !inner.sync.is_online() {
            return inner.sync.get_preferences(force_refresh).await;
        }
        let result = inner
            .retry
            .run(|| {
                let inner = inner.clone();
                async move { inner.sync.get_preferences(force_refresh).await.into_result() }
            })
            .await;
        result.unwrap_or_else(|e| SyncResult::failure(&retry_message(&e)))
    }

    pub async fn available_themes(&self) -> SyncResult<AvailableThemes> {
        let inner = &self.inner;
        if !inner.sync.is_online() {
            return inner.sync.get_available_themes().await;
        }
        let result = inner
            .retry
            .run(|| {
                let inner = inner.clone();
                async move { inner.sync.get_available_themes().await.into_result() }
            })
            .await;
        result.unwrap_or_else(|e| SyncResult::failure_with(&retry_message(&e), AvailableThemes::default()))
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> ThemeState {
        self.inner.store.state()
    }

    #[must_use]
    pub fn preferences(&self) -> ThemePreferences {
        self.inner.current_preferences()
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.inner.status.current()
    }

    #[must_use]
    pub fn watch_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    #[must_use]
    pub fn last_sync(&self) -> Option<u64> {
        self.inner.sync.last_sync()
    }
}

fn retry_message<E: Display>(err: &RetryError<E>) -> String {
    match err {
        RetryError::Exhausted { last, .. } => last.to_string(),
        RetryError::Cancelled => err.to_string(),
    }
}

// =============================================================================
// INNER
// =============================================================================

impl EngineInner {
    fn settings(&self) -> EngineSettings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_settings(&self, f: impl FnOnce(&mut EngineSettings)) {
        f(&mut self.settings.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn current_preferences(&self) -> ThemePreferences {
        let settings = self.settings();
        ThemePreferences {
            last_synced: settings.last_synced,
            ..ThemePreferences::from_state(&self.store.state(), settings.auto_switch)
        }
    }

    fn load_preferences(&self) -> Option<ThemePreferences> {
        let raw = match self.storage.get(PREFERENCES_STORAGE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "saved preferences unavailable");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, "saved preferences unreadable; ignoring"))
            .ok()
    }

    fn save_preferences(&self) {
        let prefs = self.current_preferences();
        let raw = match serde_json::to_string(&prefs) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "preferences serialization failed");
                return;
            }
        };
        if let Err(e) = self.storage.set(PREFERENCES_STORAGE_KEY, &raw) {
            warn!(error = %e, "preferences not persisted; keeping them for this session");
        }
    }

    fn local_generation(&self) -> u64 {
        self.local_generation.load(Ordering::SeqCst)
    }

    fn mark_local_change(&self) -> u64 {
        self.local_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Local state is clean when no commit happened after `since` and the
    /// server has acknowledged every commit.
    fn is_clean_since(&self, since: u64) -> bool {
        let local = self.local_generation();
        local == since && self.pushed_generation.load(Ordering::SeqCst) >= local
    }

    /// Take over a server-reconciled result started at generation `since`.
    /// A newer or unpushed local commit wins instead and is pushed again.
    fn adopt(self: &Arc<Self>, merged: &ThemePreferences, since: u64) {
        if !self.is_clean_since(since) {
            debug!(server = %merged.theme, "local commit is newer than reconcile; keeping it");
            self.update_settings(|s| s.last_synced = merged.last_synced);
            self.save_preferences();
            self.spawn_preferences_push(self.local_generation());
            return;
        }

        self.update_settings(|s| {
            s.auto_switch = merged.auto_switch;
            s.last_synced = merged.last_synced;
        });
        if self.store.state().current_theme != merged.theme {
            info!(theme = %merged.theme, "server theme applied");
            self.store.set_theme(merged.theme);
        }
        self.save_preferences();
    }

    /// One passive reconcile: no retry, no status changes.
    async fn reconcile(self: &Arc<Self>) {
        let since = self.local_generation();
        let result = self.sync.sync_preferences(&self.current_preferences()).await;
        match (result.source, &result.data) {
            (Some(DataSource::Server), Some(merged)) => self.adopt(merged, since),
            _ => debug!("background sync kept local preferences"),
        }
    }

    fn spawn_preferences_push(self: &Arc<Self>, generation: u64) {
        let prefs = self.current_preferences();
        self.spawn_push(generation, "update preferences", move |inner| {
            let prefs = prefs.clone();
            async move { inner.sync.update_preferences(&prefs).await.into_result() }
        });
    }

    /// Start a push for local `generation` in the shared push slot,
    /// aborting the push it replaces.
    fn spawn_push<T, F, Fut>(self: &Arc<Self>, generation: u64, what: &'static str, op: F)
    where
        T: Send + 'static,
        F: Fn(Arc<Self>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        let mut slot = self.push_slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let pusher = self.clone();
        *slot = self.spawn(async move { pusher.push(generation, what, op).await });
    }

    /// User-visible push with retry, reported through the sync status.
    async fn push<T, F, Fut>(self: Arc<Self>, generation: u64, what: &'static str, op: F)
    where
        F: Fn(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        if !self.sync.is_online() {
            debug!(what, "offline; push skipped");
            self.status.set(SyncStatus::Error);
            return;
        }

        self.status.set(SyncStatus::Syncing);
        let result = self.retry.run(|| op(self.clone())).await;
        match result {
            Ok(_) => {
                debug!(what, generation, "push succeeded");
                self.pushed_generation.fetch_max(generation, Ordering::SeqCst);
                self.status.set(SyncStatus::Success);
            }
            Err(RetryError::Cancelled) => debug!(what, "push cancelled"),
            Err(e) => {
                warn!(error = %e, what, "push failed");
                self.status.set(SyncStatus::Error);
            }
        }
    }

    fn spawn<Fut>(&self, task: Fut) -> Option<AbortHandle>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_triggered() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; background sync skipped");
            return None;
        };
        let handle = runtime.spawn(task);
        let abort = handle.abort_handle();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        Some(abort)
    }
}
