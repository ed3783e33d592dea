//! Engine configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sync::retry::RetryPolicy;
use crate::theme::ThemeName;
use crate::theme::transition::TransitionConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_TRANSITION_MS: u64 = 300;
pub const DEFAULT_STORAGE_PATH: &str = ".theme-sync.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub base_url: String,
    pub default_theme: ThemeName,
    pub timeouts: SyncTimeouts,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub transition_ms: u64,
    pub storage_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            default_theme: ThemeName::Dark,
            timeouts: SyncTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            transition_ms: DEFAULT_TRANSITION_MS,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}

impl SyncConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `THEME_SYNC_BASE_URL`: preferences service origin
    /// - `THEME_SYNC_DEFAULT_THEME`: `light` or `dark` (default)
    /// - `THEME_SYNC_REQUEST_TIMEOUT_SECS`: default 10
    /// - `THEME_SYNC_CONNECT_TIMEOUT_SECS`: default 5
    /// - `THEME_SYNC_MAX_RETRIES`: default 3
    /// - `THEME_SYNC_RETRY_BASE_MS`: default 1000
    /// - `THEME_SYNC_TRANSITION_MS`: default 300
    /// - `THEME_SYNC_STORAGE_PATH`: default `.theme-sync.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the default theme is not a
    /// legal theme name.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_theme = parse_theme(std::env::var("THEME_SYNC_DEFAULT_THEME").ok().as_deref())?;
        let base_url = std::env::var("THEME_SYNC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let timeouts = SyncTimeouts {
            request_secs: env_parse("THEME_SYNC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("THEME_SYNC_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let storage_path = std::env::var("THEME_SYNC_STORAGE_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);

        Ok(Self {
            base_url,
            default_theme,
            timeouts,
            max_retries: env_parse("THEME_SYNC_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_base_ms: env_parse("THEME_SYNC_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS),
            transition_ms: env_parse("THEME_SYNC_TRANSITION_MS", DEFAULT_TRANSITION_MS),
            storage_path,
        })
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, base_delay: Duration::from_millis(self.retry_base_ms) }
    }

    #[must_use]
    pub fn transition_config(&self) -> TransitionConfig {
        TransitionConfig { duration: Duration::from_millis(self.transition_ms), ..TransitionConfig::default() }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_theme(raw: Option<&str>) -> Result<ThemeName, ConfigError> {
    let raw = raw.unwrap_or("dark");
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        var: "THEME_SYNC_DEFAULT_THEME".into(),
        value: raw.to_owned(),
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
