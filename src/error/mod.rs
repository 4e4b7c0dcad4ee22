//! Error types for prospecto.

use thiserror::Error;

/// Primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error ({provider}, status {status:?}): {message}")]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("All providers exhausted (last tried: {provider}): {reason}")]
    AllProvidersExhausted { provider: String, reason: String },

    #[error("Call cancelled by caller")]
    Cancelled,

    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

/// Coarse error classification used for retry and breaker decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Serialization,
    Configuration,
    Cancelled,
    Unknown,
}

impl EngineError {
    /// Provider-attributed error for a non-2xx response or bad payload.
    pub fn provider(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Provider { status, .. } => match status {
                Some(401) | Some(403) => ErrorCategory::Authentication,
                Some(429) => ErrorCategory::RateLimit,
                Some(s) if (500..=599).contains(s) => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is transient (worth retrying on the same provider).
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EngineError>;
