//! Local-first theme preference engine with remote synchronization.
//!
//! The active theme is committed and persisted locally before anything touches
//! the network. Remote sync layers a TTL cache, bounded retry, and a
//! "success with fallback" result contract on top, so a slow or missing server
//! never blocks or rolls back a local change.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`PreferenceEngine`], the host-facing entry point |
//! | [`theme`] | Theme types, [`theme::store::ThemeStore`], palettes, transitions |
//! | [`sync`] | Result envelope, TTL cache, retry, remote/cached clients, status |
//! | [`ports`] | Host seams: clock, storage, network, document, environment |
//! | [`adapters`] | Native port implementations (`reqwest`, JSON file, memory) |
//! | [`config`] | Environment-driven [`config::SyncConfig`] |
//! | [`error`] | `thiserror` error types |
//! | [`shutdown`] | Shared teardown signal for timers |

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod shutdown;
pub mod sync;
pub mod theme;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::SyncConfig;
pub use engine::{EnginePorts, PreferenceEngine};
pub use sync::status::SyncStatus;
pub use sync::{DataSource, SyncResult};
pub use theme::{AccessibilityFlags, ThemeName, ThemePreferences, ThemeState};
