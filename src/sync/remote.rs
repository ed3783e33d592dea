//! Remote preferences client for the `/api/v1/themes` wire contract.
//!
//! DESIGN
//! ======
//! Thin typed layer over `NetworkPort`. The online signal is consulted
//! before every request, so an offline client never touches the network.
//! Bodies are parsed as JSON when possible and passed through as raw text
//! otherwise; typed operations then decode what they need.
//!
//! ERROR HANDLING
//! ==============
//! Every operation returns a [`SyncResult`]; failures are logged here and
//! flattened to their display string (`"Offline"`, `"HTTP 503: ..."`).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::SyncResult;
use crate::error::SyncError;
use crate::ports::{Clock, HttpRequest, NetworkPort};
use crate::theme::{AvailableThemes, PreferencesPatch, ThemeName, ThemePreferences, ThemeSwitch};

pub const PREFERENCES_PATH: &str = "/api/v1/themes/preferences";
pub const SWITCH_PATH: &str = "/api/v1/themes/switch";
pub const AVAILABLE_PATH: &str = "/api/v1/themes/available";

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;

// =============================================================================
// RESPONSE BODY
// =============================================================================

/// A 2xx response body: JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw),
        }
    }

    /// Collapse to a JSON value; text becomes a JSON string.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    fn decode<T: DeserializeOwned>(self) -> Result<T, SyncError> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(|e| SyncError::Parse(e.to_string())),
            Self::Text(text) => Err(SyncError::Parse(format!("expected JSON, got {text:?}"))),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::Parse(e.to_string()))
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct RemoteSyncClient {
    network: Arc<dyn NetworkPort>,
    clock: Arc<dyn Clock>,
}

impl RemoteSyncClient {
    #[must_use]
    pub fn new(network: Arc<dyn NetworkPort>, clock: Arc<dyn Clock>) -> Self {
        Self { network, clock }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    async fn send(&self, request: HttpRequest) -> Result<ResponseBody, SyncError> {
        let method = request.method.as_str();
        let path = request.path.clone();
        if !self.network.is_online() {
            debug!(method, path, "offline; request skipped");
            return Err(SyncError::Offline);
        }

        let response = self.network.request(request).await.map_err(|e| {
            warn!(error = %e, method, path, "preferences request failed");
            SyncError::from(e)
        })?;

        if !response.is_success() {
            warn!(status = response.status, method, path, "preferences request rejected");
            return Err(SyncError::Http { status: response.status, status_text: response.status_text });
        }

        Ok(ResponseBody::parse(response.body))
    }

    /// `GET /api/v1/themes/preferences`.
    pub async fn get_preferences(&self) -> SyncResult<ThemePreferences> {
        match self.fetch::<ThemePreferences>(HttpRequest::get(PREFERENCES_PATH)).await {
            Ok(prefs) => SyncResult::fetched(prefs),
            Err(e) => SyncResult::failure(&e),
        }
    }

    /// `PUT /api/v1/themes/preferences`; the ack body is returned as-is.
    pub async fn update_preferences(&self, prefs: &ThemePreferences) -> SyncResult<Value> {
        let result = async {
            let body = encode(prefs)?;
            self.send(HttpRequest::put(PREFERENCES_PATH, body)).await
        }
        .await;
        match result {
            Ok(ack) => SyncResult::fetched(ack.into_value()),
            Err(e) => SyncResult::failure(&e),
        }
    }

    /// `PATCH /api/v1/themes/switch`.
    pub async fn switch_theme(&self, theme: ThemeName) -> SyncResult<ThemeSwitch> {
        let request = HttpRequest::patch(SWITCH_PATH, serde_json::json!({ "theme": theme }));
        match self.fetch::<ThemeSwitch>(request).await {
            Ok(switched) => SyncResult::fetched(switched),
            Err(e) => SyncResult::failure(&e),
        }
    }

    /// `GET /api/v1/themes/available`, falling back to the built-in set.
    pub async fn get_available_themes(&self) -> SyncResult<AvailableThemes> {
        match self.fetch::<AvailableThemes>(HttpRequest::get(AVAILABLE_PATH)).await {
            Ok(themes) => SyncResult::fetched(themes),
            Err(e) => SyncResult::failure_with(&e, AvailableThemes::default()),
        }
    }

    /// Reconcile `local` with the server. Server fields win; the merge is
    /// stamped and pushed back. Any failure returns `local` as a successful
    /// local fallback.
    pub async fn sync_preferences(&self, local: &ThemePreferences) -> SyncResult<ThemePreferences> {
        match self.reconcile(local).await {
            Ok(merged) => SyncResult::from_server(merged),
            Err(e) => {
                warn!(error = %e, "preference sync failed; keeping local preferences");
                SyncResult::local_fallback(local.clone())
            }
        }
    }

    async fn reconcile(&self, local: &ThemePreferences) -> Result<ThemePreferences, SyncError> {
        let server = self.fetch::<PreferencesPatch>(HttpRequest::get(PREFERENCES_PATH)).await?;
        let mut merged = local.merged_with(&server);
        merged.last_synced = Some(self.clock.now_millis());
        self.send(HttpRequest::put(PREFERENCES_PATH, encode(&merged)?)).await?;
        debug!(theme = %merged.theme, "preferences reconciled with server");
        Ok(merged)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, SyncError> {
        let path = request.path.clone();
        self.send(request).await?.decode().inspect_err(|e| {
            warn!(error = %e, path, "unexpected preferences response");
        })
    }
}
