//! Host stand-ins for headless use: system clock, a document that logs its
//! side effects, and fixed environment probes.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::ports::{Clock, DocumentPort, EnvironmentProbe};
use crate::theme::palette::Palette;
use crate::theme::transition::TransitionStyle;
use crate::theme::{AccessibilityFlags, ThemeName};

// =============================================================================
// CLOCK
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Document port with no DOM: records the applied theme and logs effects.
#[derive(Debug, Default)]
pub struct TracingDocument {
    applied: Mutex<Option<ThemeName>>,
}

impl TracingDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last theme written to the (virtual) root attribute.
    pub fn applied_theme(&self) -> Option<ThemeName> {
        *self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentPort for TracingDocument {
    fn apply_theme(&self, theme: ThemeName, palette: &Palette) {
        *self.applied.lock().unwrap_or_else(PoisonError::into_inner) = Some(theme);
        debug!(
            %theme,
            high_contrast = palette.high_contrast,
            properties = palette.properties.len(),
            "data-theme applied"
        );
    }

    fn begin_transition(&self, style: &TransitionStyle) {
        debug!(duration_ms = style.duration.as_millis(), easing = %style.easing, "theme transition started");
    }

    fn end_transition(&self) {
        debug!("theme transition cleared");
    }
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Probes that always answer with fixed values; `None` models an
/// environment without media queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEnvironment {
    pub system_theme: Option<ThemeName>,
    pub accessibility: Option<AccessibilityFlags>,
}

impl EnvironmentProbe for StaticEnvironment {
    fn system_theme(&self) -> Option<ThemeName> {
        self.system_theme
    }

    fn accessibility(&self) -> Option<AccessibilityFlags> {
        self.accessibility
    }
}
