//! Theme domain types shared by the store, the sync layer, and the wire.
//!
//! DESIGN
//! ======
//! `ThemeState` is the in-memory snapshot owned by `ThemeStore`;
//! `ThemePreferences` is the unit exchanged with the remote service and
//! kept in the local cache. Wire names are camelCase to match the service.

pub mod palette;
pub mod store;
pub mod transition;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

// =============================================================================
// THEME NAME
// =============================================================================

/// The two legal themes. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    Light,
    #[default]
    Dark,
}

impl ThemeName {
    pub const ALL: [Self; 2] = [Self::Light, Self::Dark];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names neither theme.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme: {0:?}")]
pub struct UnknownTheme(pub String);

impl FromStr for ThemeName {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(UnknownTheme(other.to_owned())),
        }
    }
}

// =============================================================================
// ACCESSIBILITY + STATE
// =============================================================================

/// Environment-derived accessibility preferences. Never written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityFlags {
    pub prefers_reduced_motion: bool,
    pub prefers_high_contrast: bool,
}

/// Snapshot of everything the store knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeState {
    pub current_theme: ThemeName,
    pub system_theme: ThemeName,
    /// True only until the first `initialize` completes.
    pub is_loading: bool,
    pub accessibility: AccessibilityFlags,
}

impl ThemeState {
    #[must_use]
    pub fn new(default_theme: ThemeName) -> Self {
        Self {
            current_theme: default_theme,
            system_theme: ThemeName::Dark,
            is_loading: true,
            accessibility: AccessibilityFlags::default(),
        }
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::new(ThemeName::default())
    }
}

// =============================================================================
// PREFERENCES (WIRE + STORAGE)
// =============================================================================

/// Preferences payload exchanged with the server and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePreferences {
    pub theme: ThemeName,
    #[serde(default)]
    pub auto_switch: bool,
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default)]
    pub high_contrast: bool,
    /// Epoch milliseconds of the last successful server sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<u64>,
}

impl ThemePreferences {
    /// Preferences describing the given state, with auto-switch as supplied.
    #[must_use]
    pub fn from_state(state: &ThemeState, auto_switch: bool) -> Self {
        Self {
            theme: state.current_theme,
            auto_switch,
            reduced_motion: state.accessibility.prefers_reduced_motion,
            high_contrast: state.accessibility.prefers_high_contrast,
            last_synced: None,
        }
    }

    /// Overlay every field the server sent on top of `self`.
    #[must_use]
    pub fn merged_with(&self, server: &PreferencesPatch) -> Self {
        Self {
            theme: server.theme.unwrap_or(self.theme),
            auto_switch: server.auto_switch.unwrap_or(self.auto_switch),
            reduced_motion: server.reduced_motion.unwrap_or(self.reduced_motion),
            high_contrast: server.high_contrast.unwrap_or(self.high_contrast),
            last_synced: server.last_synced.or(self.last_synced),
        }
    }
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self::from_state(&ThemeState::default(), false)
    }
}

/// Server preferences as received, where any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub theme: Option<ThemeName>,
    pub auto_switch: Option<bool>,
    pub reduced_motion: Option<bool>,
    pub high_contrast: Option<bool>,
    pub last_synced: Option<u64>,
}

// =============================================================================
// SERVICE PAYLOADS
// =============================================================================

/// `GET /api/v1/themes/available` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableThemes {
    pub themes: Vec<ThemeName>,
    #[serde(rename = "default")]
    pub default_theme: ThemeName,
}

impl Default for AvailableThemes {
    /// The fixed set used when neither cache nor server can answer.
    fn default() -> Self {
        Self { themes: ThemeName::ALL.to_vec(), default_theme: ThemeName::Dark }
    }
}

/// `PATCH /api/v1/themes/switch` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSwitch {
    pub theme: ThemeName,
    pub switched: bool,
    /// Server-defined; kept opaque.
    #[serde(default)]
    pub timestamp: serde_json::Value,
}
