//! Remote synchronization: result envelope, TTL cache, retry, clients, and
//! user-visible sync status.
//!
//! SYSTEM CONTEXT
//! ==============
//! `remote` speaks the preferences wire contract, `cached` layers the TTL
//! cache over it, `retry` wraps user-initiated calls, and `status` tracks
//! what the UI should show about the last sync.

pub mod cache;
pub mod cached;
pub mod remote;
pub mod retry;
pub mod status;

use std::fmt;

use serde::Serialize;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Where the data in a [`SyncResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Server,
    Local,
}

/// Uniform outcome of every sync operation.
///
/// `success: false` always comes with an `error`, and with `fallback: true`
/// meaning the caller should keep using what it already has locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl<T> SyncResult<T> {
    /// Data fetched from the server by a plain call.
    #[must_use]
    pub fn fetched(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, source: None, fallback: false }
    }

    /// Data served from the TTL cache.
    #[must_use]
    pub fn cached(data: T) -> Self {
        Self { source: Some(DataSource::Cache), ..Self::fetched(data) }
    }

    /// Data reconciled with the server.
    #[must_use]
    pub fn from_server(data: T) -> Self {
        Self { source: Some(DataSource::Server), ..Self::fetched(data) }
    }

    /// The caller's local value, returned because the server was unusable.
    #[must_use]
    pub fn local_fallback(data: T) -> Self {
        Self { source: Some(DataSource::Local), fallback: true, ..Self::fetched(data) }
    }

    /// Failure with nothing better than what the caller already holds.
    #[must_use]
    pub fn failure(err: &impl fmt::Display) -> Self {
        Self { success: false, data: None, error: Some(err.to_string()), source: None, fallback: true }
    }

    /// Failure carrying a substitute payload.
    #[must_use]
    pub fn failure_with(err: &impl fmt::Display, data: T) -> Self {
        Self { data: Some(data), source: Some(DataSource::Local), ..Self::failure(err) }
    }

    /// Split into success / error message, for retry loops.
    ///
    /// # Errors
    ///
    /// Returns the envelope's error message when `success` is false.
    pub fn into_result(self) -> Result<Self, String> {
        if self.success {
            Ok(self)
        } else {
            Err(self.error.clone().unwrap_or_else(|| "unknown sync failure".to_owned()))
        }
    }
}
