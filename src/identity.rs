//! Session identity: the session id and server token attached to requests.
//!
//! Both values are computed on first access and memoized for the life of
//! the process. Later reads return the cached value without side effects.
//!
//! # Example
//!
//! ```ignore
//! use notebook_link::identity::{self, IdentityProvider, PageTokenSource};
//!
//! let page = r#"<notebook-server-token data-token="abc123"></notebook-server-token>"#;
//! let provider = IdentityProvider::new(PageTokenSource::from_html(page));
//! assert_eq!(provider.server_token().as_str(), "abc123");
//!
//! // Process-wide provider used by default by the request client
//! let session = identity::global().session_id();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable consulted by [`EnvTokenSource::default`].
pub const SERVER_TOKEN_ENV: &str = "NOTEBOOK_SERVER_TOKEN";

/// Matches the token element embedded in the host page.
static TOKEN_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<notebook-server-token\b[^>]*?\bdata-token\s*=\s*"([^"]*)""#)
        .expect("token element pattern is valid")
});

// ============================================================================
// SessionId
// ============================================================================

/// Stable per-process session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ServerToken
// ============================================================================

/// One-time server authentication token.
///
/// Empty when the host page carries no token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ServerToken(String);

impl ServerToken {
    /// Creates a token from a raw value.
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no token was found.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ServerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// TokenSource
// ============================================================================

/// Where the server token comes from.
///
/// Consulted at most once per [`IdentityProvider`].
pub trait TokenSource: Send + Sync {
    /// Returns the token, or `None` if the host did not provide one.
    fn server_token(&self) -> Option<String>;
}

/// Reads the token from the host page's `<notebook-server-token>` element.
#[derive(Debug, Clone, Default)]
pub struct PageTokenSource {
    html: String,
}

impl PageTokenSource {
    /// Creates a source over host page markup.
    #[inline]
    #[must_use]
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

impl TokenSource for PageTokenSource {
    fn server_token(&self) -> Option<String> {
        TOKEN_ELEMENT
            .captures(&self.html)
            .and_then(|caps| caps.get(1))
            .map(|token| token.as_str().to_owned())
    }
}

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    /// Creates a source reading `var`.
    #[inline]
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenSource {
    fn default() -> Self {
        Self::new(SERVER_TOKEN_ENV)
    }
}

impl TokenSource for EnvTokenSource {
    fn server_token(&self) -> Option<String> {
        env::var(&self.var).ok()
    }
}

/// A token known up front.
#[derive(Debug, Clone, Default)]
pub struct FixedTokenSource(Option<String>);

impl FixedTokenSource {
    /// Creates a source that always yields `token`.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Creates a source with no token.
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self(None)
    }
}

impl TokenSource for FixedTokenSource {
    fn server_token(&self) -> Option<String> {
        self.0.clone()
    }
}

// ============================================================================
// IdentityProvider
// ============================================================================

/// Resolves and memoizes the session identity.
///
/// Concurrent first reads still produce a single value.
pub struct IdentityProvider {
    session_id: OnceLock<SessionId>,
    server_token: OnceLock<ServerToken>,
    source: Box<dyn TokenSource>,
}

impl IdentityProvider {
    /// Creates a provider backed by `source`.
    #[must_use]
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            session_id: OnceLock::new(),
            server_token: OnceLock::new(),
            source: Box::new(source),
        }
    }

    /// Returns the session id, generating it on first call.
    pub fn session_id(&self) -> SessionId {
        *self.session_id.get_or_init(|| {
            let id = SessionId::generate();
            debug!(session_id = %id, "Session id generated");
            id
        })
    }

    /// Returns the server token, reading the source on first call.
    ///
    /// A missing token yields an empty value.
    pub fn server_token(&self) -> &ServerToken {
        self.server_token.get_or_init(|| match self.source.server_token() {
            Some(token) => ServerToken::new(token),
            None => {
                debug!("No server token found, using empty token");
                ServerToken::default()
            }
        })
    }
}

impl fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvider")
            .field("session_id", &self.session_id.get())
            .field("has_token", &self.server_token.get().map(|t| !t.is_empty()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Process-wide provider
// ============================================================================

static PENDING_SOURCE: Mutex<Option<Box<dyn TokenSource>>> = Mutex::new(None);
static GLOBAL: OnceLock<Arc<IdentityProvider>> = OnceLock::new();

/// Sets the token source for the process-wide provider.
///
/// # Errors
///
/// Returns [`Error::Config`] if [`global`] has already been called.
pub fn install_token_source(source: impl TokenSource + 'static) -> Result<()> {
    // `global()` takes this lock inside its initializer, so holding it keeps
    // the provider from being built between the check and the store.
    let mut pending = PENDING_SOURCE.lock();
    if GLOBAL.get().is_some() {
        return Err(Error::config(
            "identity already initialized; install the token source before first use",
        ));
    }
    *pending = Some(Box::new(source));
    Ok(())
}

/// Returns the process-wide identity provider.
///
/// Uses the installed token source, or [`EnvTokenSource::default`].
pub fn global() -> Arc<IdentityProvider> {
    Arc::clone(GLOBAL.get_or_init(|| {
        let provider = match PENDING_SOURCE.lock().take() {
            Some(source) => IdentityProvider {
                session_id: OnceLock::new(),
                server_token: OnceLock::new(),
                source,
            },
            None => IdentityProvider::new(EnvTokenSource::default()),
        };
        Arc::new(provider)
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl TokenSource for CountingSource {
        fn server_token(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("counted".into())
        }
    }

    #[test]
    fn test_session_id_is_stable() {
        let provider = IdentityProvider::new(FixedTokenSource::absent());
        let first = provider.session_id();
        assert_eq!(first, provider.session_id());
        assert_eq!(first.to_string(), first.as_uuid().to_string());
    }

    #[test]
    fn test_session_id_differs_between_providers() {
        let a = IdentityProvider::new(FixedTokenSource::absent());
        let b = IdentityProvider::new(FixedTokenSource::absent());
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_missing_token_is_empty() {
        let provider = IdentityProvider::new(FixedTokenSource::absent());
        assert!(provider.server_token().is_empty());
    }

    #[test]
    fn test_token_source_read_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(IdentityProvider::new(CountingSource {
            calls: Arc::clone(&calls),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || provider.server_token().as_str().to_owned())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().expect("thread"), "counted");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_page_token_source() {
        let html = r#"<html><body>
            <notebook-server-token data-token="tok-42" hidden></notebook-server-token>
        </body></html>"#;
        assert_eq!(
            PageTokenSource::from_html(html).server_token().as_deref(),
            Some("tok-42")
        );
    }

    #[test]
    fn test_page_token_source_attribute_order() {
        let html = r#"<notebook-server-token hidden data-token = "late"></notebook-server-token>"#;
        assert_eq!(
            PageTokenSource::from_html(html).server_token().as_deref(),
            Some("late")
        );
    }

    #[test]
    fn test_page_without_token() {
        let html = "<html><body><div data-token=\"nope\"></div></body></html>";
        assert!(PageTokenSource::from_html(html).server_token().is_none());
    }

    #[test]
    fn test_env_token_source_missing_var() {
        let source = EnvTokenSource::new("NOTEBOOK_LINK_TEST_UNSET_TOKEN_VAR");
        assert!(source.server_token().is_none());
    }

    #[test]
    fn test_install_after_global_fails() {
        let _ = global();
        let err = install_token_source(FixedTokenSource::new("late")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_install_racing_global_is_never_lost() {
        let installer = thread::spawn(|| install_token_source(FixedTokenSource::new("raced")));
        let reader = thread::spawn(|| global().server_token().as_str().to_owned());

        let installed = installer.join().expect("installer");
        let token = reader.join().expect("reader");

        // Either the install lost and was told so, or the provider saw it.
        if installed.is_ok() {
            assert_eq!(token, "raced");
        } else {
            assert_ne!(token, "raced");
        }
        assert!(install_token_source(FixedTokenSource::new("after")).is_err());
    }

    #[test]
    fn test_global_is_shared() {
        assert_eq!(global().session_id(), global().session_id());
    }
}
