//! Error types for notebook-link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use notebook_link::{Error, Result};
//!
//! async fn run(client: &ApiClient) -> Result<()> {
//!     match client.post::<_, serde_json::Value>("/kernel/run", &body, &opts).await {
//!         Err(Error::Request(failure)) => eprintln!("{}: {:?}", failure.status_text, failure.cause),
//!         other => { other?; }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Runtime`], [`Error::Url`] |
//! | Request | [`Error::Request`], [`Error::Http`], [`Error::InvalidHeader`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::WebSocket`] |
//! | Bridge | [`Error::Engine`] |
//! | External | [`Error::Json`] |
//!
//! Transport-level failures are never returned from transport operations;
//! they arrive as `error` and `close` events instead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use reqwest::StatusCode;
use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// RequestFailure
// ============================================================================

/// Body the server sent along with a non-success status.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// Body declared as JSON, parsed.
    Json(Value),
    /// Any other body, verbatim.
    Text(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A request that reached the server and came back with a non-2xx status.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFailure {
    /// Full request URL.
    pub url: String,
    /// HTTP status code.
    pub status: StatusCode,
    /// Reason phrase for the status. Never empty.
    pub status_text: String,
    /// Body the server sent.
    pub cause: FailureCause,
}

impl RequestFailure {
    /// Creates a failure, deriving the status text from the status code.
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode, cause: FailureCause) -> Self {
        let status_text = status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_owned);

        Self {
            url: url.into(),
            status,
            status_text,
            cause,
        }
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a builder or option set is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No tokio runtime available.
    ///
    /// Transports deliver events from a runtime task and must be created
    /// inside one.
    #[error("Runtime unavailable: {message}")]
    Runtime {
        /// Description of the missing runtime context.
        message: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// Server answered with a non-success status.
    #[error("Request to {} failed: {}", .0.url, .0.status_text)]
    Request(RequestFailure),

    /// HTTP transport failure (DNS, connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Header name or value rejected.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the rejected header.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport is closing or closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// In-process engine failure.
    #[error("Engine error: {message}")]
    Engine {
        /// Description of the engine failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<RequestFailure> for Error {
    fn from(failure: RequestFailure) -> Self {
        Self::Request(failure)
    }
}

impl From<InvalidHeaderName> for Error {
    fn from(err: InvalidHeaderName) -> Self {
        Self::InvalidHeader {
            message: err.to_string(),
        }
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(err: InvalidHeaderValue) -> Self {
        Self::InvalidHeader {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a runtime unavailable error.
    #[inline]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Creates an engine error.
    #[inline]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the server-side failure, if this is one.
    #[inline]
    #[must_use]
    pub fn as_request_failure(&self) -> Option<&RequestFailure> {
        match self {
            Self::Request(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns `true` if the server answered with a non-success status.
    #[inline]
    #[must_use]
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::WebSocket(_))
            || matches!(self, Self::Http(err) if err.is_connect() || err.is_timeout())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_config_error() {
        let err = Error::config("base URL missing");
        assert_eq!(err.to_string(), "Configuration error: base URL missing");
    }

    #[test]
    fn test_request_failure_status_text() {
        let failure = RequestFailure::new(
            "http://localhost/api/kernel/run",
            StatusCode::INTERNAL_SERVER_ERROR,
            FailureCause::Json(json!({"detail": "syntax error"})),
        );
        assert_eq!(failure.status_text, "Internal Server Error");

        let err: Error = failure.into();
        assert!(err.is_request_failure());
        assert_eq!(
            err.to_string(),
            "Request to http://localhost/api/kernel/run failed: Internal Server Error"
        );
    }

    #[test]
    fn test_status_text_never_empty() {
        let status = StatusCode::from_u16(599).expect("valid status");
        let failure = RequestFailure::new("u", status, FailureCause::Text(String::new()));
        assert_eq!(failure.status_text, "599");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
        assert!(!Error::engine("x").is_connection_error());
    }

    #[test]
    fn test_failure_cause_display() {
        assert_eq!(FailureCause::Text("boom".into()).to_string(), "boom");
        assert_eq!(
            FailureCause::Json(json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, Error::Url(_)));
    }
}
