//! Error types for the copyvio engine.
//!
//! Only request-level problems surface as [`CopyvioError`]. Everything that
//! can go wrong with a single candidate is a [`FetchError`] and ends up in the
//! report's per-candidate breakdown, and search failures are [`SearchError`]s
//! absorbed the same way.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for copyvio operations.
#[derive(Debug, Error)]
pub enum CopyvioError {
    /// The check request was rejected before any work was dispatched.
    #[error("{0}")]
    InvalidRequest(#[from] RequestValidationError),

    /// The engine could not be configured (e.g. HTTP client construction).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CopyvioError {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match self {
            Self::InvalidRequest(err) => {
                let mut map = err.to_dict();
                map.insert("type".to_string(), serde_json::json!("InvalidRequest"));
                map
            }
            Self::Config(message) => {
                let mut map = HashMap::new();
                map.insert("type".to_string(), serde_json::json!("Config"));
                map.insert("message".to_string(), serde_json::json!(message));
                map
            }
        }
    }
}

/// Error raised when a check request fails validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Invalid check request: {field}: {message}")]
pub struct RequestValidationError {
    /// The offending request field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl RequestValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("field".to_string(), serde_json::json!(self.field));
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Errors that can occur while fetching a single candidate.
///
/// None of these abort a check; the candidate is marked failed and the
/// remaining candidates proceed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch did not finish within its time bound.
    #[error("fetch timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("HTTP error: status {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// Connection, DNS, TLS or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body exceeded the configured size cap.
    #[error("response too large: exceeds {limit} bytes")]
    TooLarge {
        /// The configured cap in bytes.
        limit: usize,
    },

    /// The response is neither HTML nor plain text.
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),
}

impl FetchError {
    /// Creates an HTTP status error.
    #[must_use]
    pub const fn http(status: u16) -> Self {
        Self::Http { status }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Short, stable name of the error kind, used in events and reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Http { .. } => "http_error",
            Self::Network(_) => "network_error",
            Self::TooLarge { .. } => "too_large",
            Self::UnsupportedContent(_) => "unsupported_content",
        }
    }

    /// Whether this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors returned by a search provider for a single query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// The provider rejected or failed the query.
    #[error("search query failed: {0}")]
    Query(String),

    /// The query did not return before the check deadline.
    #[error("search timed out")]
    Timeout,

    /// Transport failure talking to the provider.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider's response could not be understood.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for copyvio results.
pub type Result<T> = std::result::Result<T, CopyvioError>;
