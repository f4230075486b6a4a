//! Per-call request options.

// ============================================================================
// RequestOptions
// ============================================================================

/// Overrides for a single request.
///
/// # Example
///
/// ```
/// use notebook_link::client::RequestOptions;
///
/// let options = RequestOptions::new()
///     .with_header("X-Notebook-Path", "/notebooks/intro.py")
///     .with_base_url("http://127.0.0.1:2718/");
///
/// assert_eq!(options.headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers, applied after identity headers so they win on conflict.
    pub headers: Vec<(String, String)>,
    /// Origin replacing the client's base URL for this call.
    pub base_url: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            headers: Vec::new(),
            base_url: None,
        }
    }

    /// Adds a header. A later header with the same name replaces earlier ones.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Overrides the request origin.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let options = RequestOptions::default();
        assert!(options.headers.is_empty());
        assert!(options.base_url.is_none());
        assert_eq!(options, RequestOptions::new());
    }

    #[test]
    fn test_with_header_keeps_order() {
        let options = RequestOptions::new()
            .with_header("A", "1")
            .with_header("A", "2");
        assert_eq!(
            options.headers,
            [("A".to_owned(), "1".to_owned()), ("A".to_owned(), "2".to_owned())]
        );
    }
}
