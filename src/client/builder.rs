//! Builder pattern for request client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use notebook_link::client::ApiClient;
//!
//! # fn example() -> notebook_link::Result<()> {
//! let client = ApiClient::builder()
//!     .base_url("http://127.0.0.1:2718/")
//!     .timeout(Duration::from_secs(30))
//!     .default_header("X-Notebook-Path", "/notebooks/intro.py")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};
use crate::identity::{self, IdentityProvider};

use super::core::ApiClient;

// ============================================================================
// ApiClientBuilder
// ============================================================================

/// Builder for an [`ApiClient`].
///
/// Use [`ApiClient::builder()`] to create one.
#[derive(Debug, Default, Clone)]
pub struct ApiClientBuilder {
    /// Origin every path is resolved against.
    base_url: Option<String>,
    /// Identity source; the process-wide provider if unset.
    identity: Option<Arc<IdentityProvider>>,
    /// Whole-request timeout.
    timeout: Option<Duration>,
    /// Headers sent with every request.
    default_headers: Vec<(String, String)>,
}

impl ApiClientBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend origin, e.g. `http://127.0.0.1:2718/`.
    ///
    /// A trailing `/` is added if missing.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Uses `identity` instead of the process-wide provider.
    #[must_use]
    pub fn identity(mut self, identity: Arc<IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets a timeout covering connect through body read.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Validates the configuration and creates the client.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no base URL was set or it cannot be a base
    /// - [`Error::Url`] if the base URL does not parse
    /// - [`Error::InvalidHeader`] if a default header is malformed
    /// - [`Error::Http`] if the HTTP client cannot be initialized
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self.validate_base_url()?;
        let default_headers = header_map(&self.default_headers)?;

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(ApiClient::new(
            http.build()?,
            base_url,
            self.identity.unwrap_or_else(identity::global),
            default_headers,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ApiClientBuilder {
    fn validate_base_url(&self) -> Result<String> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            Error::config(
                "Base URL is required. Use .base_url() to set it.\n\
                 Example: ApiClient::builder().base_url(\"http://127.0.0.1:2718/\")",
            )
        })?;
        normalize_base_url(base_url)
    }
}

/// Checks `base_url` and ensures it ends with `/`.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String> {
    let parsed = Url::parse(base_url)?;
    if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "Base URL must be an http(s) origin, got {base_url}"
        )));
    }

    let mut base_url = base_url.to_owned();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Ok(base_url)
}

/// Converts name/value pairs into a header map; later names replace earlier.
pub(crate) fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        headers.insert(
            HeaderName::try_from(name.as_str())?,
            HeaderValue::try_from(value.as_str())?,
        );
    }
    Ok(headers)
}

// ============================================================================
// Tests
// ============================================================================
