//! Ports: the environment seams the engine is built against.
//!
//! SYSTEM CONTEXT
//! ==============
//! Everything the engine reads from or writes to the host goes through one
//! of these traits: time, key/value storage, HTTP, the document root, media
//! preference probes, and an optional native view-transition primitive.
//! Adapters live in `crate::adapters`; tests use the mocks in
//! `crate::test_helpers`.

use serde_json::Value;

use crate::error::{NetworkError, StorageError, TransitionError};
use crate::theme::palette::Palette;
use crate::theme::transition::TransitionStyle;
use crate::theme::{AccessibilityFlags, ThemeName};

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

// =============================================================================
// STORAGE
// =============================================================================

/// Fallible string key/value store (browser `localStorage` shaped).
pub trait StoragePort: Send + Sync {
    /// Read a raw value. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a raw value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend rejects the delete.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every key currently stored.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be enumerated.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// NETWORK
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Patch,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

/// A request against the preferences service, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self { method: HttpMethod::Get, path: path.to_owned(), body: None }
    }

    #[must_use]
    pub fn put(path: &str, body: Value) -> Self {
        Self { method: HttpMethod::Put, path: path.to_owned(), body: Some(body) }
    }

    #[must_use]
    pub fn patch(path: &str, body: Value) -> Self {
        Self { method: HttpMethod::Patch, path: path.to_owned(), body: Some(body) }
    }
}

/// A completed HTTP exchange. Any status, including errors, lands here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport plus the host's online/offline signal.
#[async_trait::async_trait]
pub trait NetworkPort: Send + Sync {
    /// Current connectivity signal. Checked before every request.
    fn is_online(&self) -> bool;

    /// Perform one request.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] when no HTTP response was obtained.
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError>;
}

// =============================================================================
// DOCUMENT + ENVIRONMENT
// =============================================================================

/// Write-only styling outputs on the document root.
pub trait DocumentPort: Send + Sync {
    /// Set the `data-theme` attribute and the themed custom properties.
    fn apply_theme(&self, theme: ThemeName, palette: &Palette);

    /// Install the transition class and duration/easing properties.
    fn begin_transition(&self, style: &TransitionStyle);

    /// Remove everything `begin_transition` installed.
    fn end_transition(&self);
}

/// Read-only media preference probes. `None` means the probe is unavailable.
pub trait EnvironmentProbe: Send + Sync {
    fn system_theme(&self) -> Option<ThemeName>;
    fn accessibility(&self) -> Option<AccessibilityFlags>;
}

/// Native view-transition primitive (`document.startViewTransition`).
#[async_trait::async_trait]
pub trait ViewTransitionPort: Send + Sync {
    /// Run `update` inside a native transition and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] if the primitive throws. `update` may or
    /// may not have been called by then.
    async fn run(&self, update: &mut (dyn FnMut() + Send)) -> Result<(), TransitionError>;
}
