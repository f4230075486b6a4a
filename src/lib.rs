//! Notebook Link - communication layer between a notebook UI and its kernel.
//!
//! This library provides the client-side substrate a notebook front end uses
//! to talk to a long-lived execution backend ("kernel").
//!
//! # Architecture
//!
//! Two independent halves share one identity:
//!
//! - **Requests**: authenticated one-shot GET/POST calls ([`ApiClient`])
//! - **Real-time channel**: a bidirectional event stream behind the
//!   [`Transport`] trait, backed by a live WebSocket, a pre-recorded replay,
//!   or an in-process execution engine
//!
//! Key design principles:
//!
//! - Transport operations never block and never fail; outcomes arrive as
//!   `open` / `message` / `close` / `error` events
//! - Each transport delivers events from its own task, in production order
//! - Consumers never pick a backend; [`ConnectionManager`] does
//! - Session identity is computed once per process ([`identity`])
//!
//! # Quick Start
//!
//! ```no_run
//! use notebook_link::client::{ApiClient, RequestOptions};
//! use notebook_link::manager::{ConnectOptions, EventHandlers, SessionHub};
//! use notebook_link::{Result, identity};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // One-shot request with identity headers attached
//!     let client = ApiClient::builder().base_url("http://127.0.0.1:2718/").build()?;
//!     let status: notebook_link::client::Payload<serde_json::Value> =
//!         client.get("/status", &RequestOptions::new()).await?;
//!     println!("status: {status:?}");
//!
//!     // Real-time channel shared by every component of this session
//!     let handlers = EventHandlers::new()
//!         .on_open(|| println!("kernel connected"))
//!         .on_message(|frame| println!("kernel: {frame}"));
//!
//!     let subscription = SessionHub::global().subscribe(
//!         identity::global().session_id(),
//!         &ConnectOptions::live("ws://127.0.0.1:2718/ws"),
//!         &handlers,
//!     )?;
//!     subscription.send(r#"{"op":"run","cellId":"abc"}"#)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Request client, options and payloads |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identity`] | Session id and server token |
//! | [`manager`] | Variant selection, mount handles, session hub |
//! | [`signals`] | Debounced per-signal handlers |
//! | [`transport`] | Transport trait and its three backends |

// ============================================================================
// Modules
// ============================================================================

/// Authenticated request client.
///
/// Use [`ApiClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Process-wide session identity.
pub mod identity;

/// Binding transports to UI mounts and sessions.
pub mod manager;

/// Debounced handlers keyed by signal name.
pub mod signals;

/// Real-time transport layer.
///
/// - [`LiveTransport`] - WebSocket with bounded reconnection
/// - [`ReplayTransport`] - recorded frames, no I/O
/// - [`BridgeTransport`] - in-process execution engine
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ApiClient, ApiClientBuilder, Payload, RequestOptions};

// Error types
pub use error::{Error, FailureCause, RequestFailure, Result};

// Identity types
pub use identity::{IdentityProvider, ServerToken, SessionId};

// Manager types
pub use manager::{
    ConnectOptions, Connection, ConnectionManager, EventHandlers, SessionHub, Subscription,
};

// Signal types
pub use signals::SignalDebouncer;

// Transport types
pub use transport::{
    BridgeTransport, CloseEvent, EventKind, LiveOptions, LiveTransport, ReadyState,
    ReplayTransport, Transport, TransportKind, WireEvent,
};
