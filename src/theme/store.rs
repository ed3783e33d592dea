//! Theme store, the single owner of `ThemeState`.
//!
//! DESIGN
//! ======
//! Mutations go through [`ThemeStore::dispatch`] with an exhaustively matched
//! [`ThemeAction`]. The state lock is held only for the mutation itself;
//! persistence, document writes, and subscriber callbacks run after it is
//! released and see a copied snapshot.
//!
//! Theme changes are committed, persisted, and applied before `dispatch`
//! returns. Environment events (system theme, accessibility) update only
//! their own fields and never the current theme.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures are logged and swallowed; the theme then lives for the
//! session only. Unknown persisted values fall back to the default theme.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::palette::Palette;
use super::{AccessibilityFlags, ThemeName, ThemeState};
use crate::ports::{DocumentPort, EnvironmentProbe, StoragePort};

pub const THEME_STORAGE_KEY: &str = "preferred-theme";

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    SetTheme(ThemeName),
    ToggleTheme,
    SetSystemTheme(ThemeName),
    SetAccessibility(AccessibilityFlags),
}

pub type SubscriptionId = u64;
type Listener = Arc<dyn Fn(&ThemeState) + Send + Sync>;

pub struct ThemeStore {
    storage: Arc<dyn StoragePort>,
    document: Arc<dyn DocumentPort>,
    environment: Arc<dyn EnvironmentProbe>,
    default_theme: ThemeName,
    state: Mutex<ThemeState>,
    initialized: AtomicBool,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
}

impl ThemeStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StoragePort>,
        document: Arc<dyn DocumentPort>,
        environment: Arc<dyn EnvironmentProbe>,
        default_theme: ThemeName,
    ) -> Self {
        Self {
            storage,
            document,
            environment,
            default_theme,
            state: Mutex::new(ThemeState::new(default_theme)),
            initialized: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> ThemeState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // INITIALIZE
    // =========================================================================

    /// Hydrate from storage and the environment probes. Runs once; later
    /// calls return the current snapshot untouched.
    pub fn initialize(&self) -> ThemeState {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let current_theme = self.load_persisted_theme();
        let system_theme = self.environment.system_theme().unwrap_or(ThemeName::Dark);
        let accessibility = self.environment.accessibility().unwrap_or_default();

        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = ThemeState { current_theme, system_theme, is_loading: false, accessibility };
            *state
        };

        info!(theme = %current_theme, system = %system_theme, "theme store initialized");
        self.apply(&snapshot);
        self.notify(&snapshot);
        snapshot
    }

    fn load_persisted_theme(&self) -> ThemeName {
        match self.storage.get(THEME_STORAGE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "persisted theme unreadable; using default");
                self.default_theme
            }),
            Ok(None) => self.default_theme,
            Err(e) => {
                warn!(error = %e, "theme storage unavailable; using default");
                self.default_theme
            }
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    pub fn set_theme(&self, theme: ThemeName) -> ThemeState {
        self.dispatch(ThemeAction::SetTheme(theme))
    }

    /// Set from a raw name. Unknown names are ignored and the current theme
    /// is kept; returns whether the name was accepted.
    pub fn set_theme_str(&self, raw: &str) -> bool {
        match raw.parse::<ThemeName>() {
            Ok(theme) => {
                self.set_theme(theme);
                true
            }
            Err(e) => {
                debug!(error = %e, "theme change rejected");
                false
            }
        }
    }

    pub fn toggle_theme(&self) -> ThemeState {
        self.dispatch(ThemeAction::ToggleTheme)
    }

    pub fn dispatch(&self, action: ThemeAction) -> ThemeState {
        let (before, after) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let before = *state;
            match action {
                ThemeAction::SetTheme(theme) => state.current_theme = theme,
                ThemeAction::ToggleTheme => state.current_theme = state.current_theme.opposite(),
                ThemeAction::SetSystemTheme(theme) => state.system_theme = theme,
                ThemeAction::SetAccessibility(flags) => state.accessibility = flags,
            }
            (before, *state)
        };

        match action {
            ThemeAction::SetTheme(_) | ThemeAction::ToggleTheme => {
                self.persist(after.current_theme);
                self.apply(&after);
            }
            ThemeAction::SetAccessibility(flags)
                if flags.prefers_high_contrast != before.accessibility.prefers_high_contrast =>
            {
                self.apply(&after);
            }
            ThemeAction::SetSystemTheme(_) | ThemeAction::SetAccessibility(_) => {}
        }

        if after != before {
            self.notify(&after);
        }
        after
    }

    fn persist(&self, theme: ThemeName) {
        if let Err(e) = self.storage.set(THEME_STORAGE_KEY, theme.as_str()) {
            warn!(error = %e, %theme, "theme not persisted; keeping it for this session");
        }
    }

    fn apply(&self, state: &ThemeState) {
        let palette = Palette::for_theme(state.current_theme, state.accessibility.prefers_high_contrast);
        self.document.apply_theme(state.current_theme, &palette);
    }

    // =========================================================================
    // SUBSCRIBERS
    // =========================================================================

    /// Register a callback invoked with every changed snapshot.
    pub fn subscribe(&self, listener: impl Fn(&ThemeState) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn notify(&self, snapshot: &ThemeState) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}
