//! Authenticated one-shot requests to the notebook backend.
//!
//! Every request targets `<base_url>api<path>` and carries the `Session-Id`
//! and `Server-Token` identity headers. Caller headers override them.
//!
//! # Response Handling
//!
//! | Status | Content type | GET | POST |
//! |--------|--------------|-----|------|
//! | 2xx | JSON | [`Payload::Json`] | [`Payload::Json`] |
//! | 2xx | other | [`Payload::Empty`] | [`Payload::Text`] |
//! | non-2xx | JSON | `Error::Request` with [`FailureCause::Json`](crate::FailureCause::Json) | same |
//! | non-2xx | other | `Error::Request` with [`FailureCause::Text`](crate::FailureCause::Text) | same |
//!
//! Failures to reach the server at all are logged with the URL and
//! returned as `Error::Http`.

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Client, payload and request descriptor.
pub mod core;

/// Per-call overrides.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ApiClientBuilder;
pub use core::{ApiClient, Payload, RequestDescriptor, SERVER_TOKEN_HEADER, SESSION_ID_HEADER};
pub use options::RequestOptions;
