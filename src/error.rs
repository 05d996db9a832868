//! Huginn error types

use std::sync::Arc;
use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("no credential available for provider '{0}'")]
    MissingCredential(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("no provider registered for '{0}'")]
    NoProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Cache errors
    #[error("cache import failed: {0}")]
    Import(String),

    #[error("durable storage error: {0}")]
    Storage(String),

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    /// Failure of an in-flight request that this caller was coalesced onto.
    #[error(transparent)]
    Shared(Arc<HuginnError>),
}

impl HuginnError {
    /// Whether the error is worth retrying against the same provider.
    ///
    /// Network failures, timeouts, rate limiting and upstream status codes
    /// 5xx/408/429 are transient. Everything else (auth, validation, unknown
    /// models, configuration) fails immediately without consuming retries.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Shared(inner) => inner.is_transient(),
            _ => false,
        }
    }

    /// Provider-supplied delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Shared(inner) => inner.retry_after(),
            _ => None,
        }
    }

    /// The underlying error, looking through [`Shared`](Self::Shared).
    pub fn root(&self) -> &HuginnError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return HuginnError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        HuginnError::Http(err.to_string())
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
