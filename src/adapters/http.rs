//! `reqwest`-backed network port.
//!
//! The online flag is host-owned: the embedding app flips it from its
//! connectivity signal. Transport errors are classified so the sync layer can
//! tell timeouts from refused connections in its logs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::NetworkError;
use crate::ports::{HttpMethod, HttpRequest, HttpResponse, NetworkPort};

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

pub struct HttpNetwork {
    http: reqwest::Client,
    base_url: String,
    online: AtomicBool,
}

impl HttpNetwork {
    /// Build a client against `base_url` with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Request`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| NetworkError::Request(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), online: AtomicBool::new(true) })
    }

    /// Build a client from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Request`] if the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig) -> Result<Self, NetworkError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeouts.request_secs),
            Duration::from_secs(config.timeouts.connect_secs),
        )
    }

    /// Update the connectivity signal.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

fn classify(err: &reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout(err.to_string())
    } else if err.is_connect() {
        NetworkError::Connection(err.to_string())
    } else {
        NetworkError::classify(&err.to_string())
    }
}

#[async_trait::async_trait]
impl NetworkPort for HttpNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        if !self.is_online() {
            return Err(NetworkError::Offline);
        }

        let url = join_url(&self.base_url, &request.path);
        let mut builder = self.http.request(to_reqwest_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_owned();
        let body = response.text().await.map_err(|e| classify(&e))?;

        Ok(HttpResponse { status: status.as_u16(), status_text, body })
    }
}
