use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by tracker clients.
///
/// None of these are fatal to the process: the sync layer abandons the
/// current unit of work and retries on the next cycle.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// API error from the tracker.
    #[error("API error: {message}")]
    Api { message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Token rejected or missing.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Issue or repository not found.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// A repository URL that cannot be turned into owner/name.
    #[error("Invalid repository reference: {reference}")]
    InvalidRef { reference: String },

    /// Response body did not match the expected shape.
    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

impl TrackerError {
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    #[inline]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn invalid_ref(reference: impl Into<String>) -> Self {
        Self::InvalidRef {
            reference: reference.into(),
        }
    }

    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Check if this error is a rate limit error (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the same request may succeed if repeated shortly.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
    }

    /// Classify an HTTP status code and response body into a typed error.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::auth(format!("{}: {}", status, body))
            }
            reqwest::StatusCode::NOT_FOUND => Self::not_found(body.to_string()),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Self::RateLimited {
                reset_at: Utc::now() + chrono::Duration::minutes(1),
            },
            _ => Self::api(format!("{}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, &err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Extract a short error message suitable for logging.
///
/// Takes the first line of an error message, which is useful for errors
/// that include response bodies or multi-line details.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
