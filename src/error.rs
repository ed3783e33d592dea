//! Error types for every port and layer of the engine.
//!
//! ERROR HANDLING
//! ==============
//! None of these errors are fatal. Storage and transition failures are
//! logged and swallowed at the point of use; network and HTTP failures are
//! flattened into the `error` string of a [`crate::sync::SyncResult`] so no
//! raw error crosses a component boundary.

// =============================================================================
// PORT ERRORS
// =============================================================================

/// Failures reported by a [`crate::ports::StoragePort`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Storage is not available in this environment (private mode, no backend).
    #[error("storage unavailable")]
    Unavailable,

    /// The backend refused the write because it is full.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// The backend denied access to the key.
    #[error("storage access denied: {0}")]
    Denied(String),

    /// Reading or writing the backing medium failed.
    #[error("storage I/O failed: {0}")]
    Io(String),
}

/// Transport-level failures reported by a [`crate::ports::NetworkPort`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The host reports no connectivity.
    #[error("Offline")]
    Offline,

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Any other transport failure.
    #[error("network request failed: {0}")]
    Request(String),
}

impl NetworkError {
    /// Classify a transport failure from its message when the port only
    /// surfaces text.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("offline") {
            Self::Offline
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout(message.to_owned())
        } else if lower.contains("connect") || lower.contains("refused") || lower.contains("reset") {
            Self::Connection(message.to_owned())
        } else {
            Self::Request(message.to_owned())
        }
    }
}

/// Failure of a native view-transition primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The primitive rejected or aborted the transition.
    #[error("view transition failed: {0}")]
    Primitive(String),
}

// =============================================================================
// CONFIG
// =============================================================================

/// Configuration could not be built from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

// =============================================================================
// SYNC
// =============================================================================

/// Why a remote call produced no usable server data.
///
/// The `Display` output is the exact string placed in a result envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The online signal was false; no request was attempted.
    #[error("Offline")]
    Offline,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// The request failed in flight.
    #[error("{0}")]
    Network(NetworkError),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Offline => Self::Offline,
            other => Self::Network(other),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
