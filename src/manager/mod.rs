//! Binding transports to their consumers.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Picks Bridge, Replay or Live and builds it |
//! | [`Connection`] | Transport owned by one UI mount |
//! | [`SessionHub`] | Process-scoped transports keyed by session |
//! | [`Subscription`] | A component's handlers on a hub transport |
//! | [`EventHandlers`] | open/message/close/error callbacks |
//!
//! # Example
//!
//! ```no_run
//! use notebook_link::identity;
//! use notebook_link::manager::{ConnectOptions, EventHandlers, SessionHub};
//!
//! # fn example() -> notebook_link::Result<()> {
//! let handlers = EventHandlers::new()
//!     .on_message(|frame| println!("kernel: {frame}"))
//!     .on_close(|close| println!("closed: {}", close.code));
//!
//! let subscription = SessionHub::global().subscribe(
//!     identity::global().session_id(),
//!     &ConnectOptions::live("ws://127.0.0.1:2718/ws"),
//!     &handlers,
//! )?;
//! subscription.send(r#"{"op":"run","cell":"abc"}"#)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Variant selection and the mount-bound handle.
pub mod connection;

/// Handler set builder.
pub mod handlers;

/// Session-keyed transport registry.
pub mod hub;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectOptions, Connection, ConnectionManager};
pub use handlers::EventHandlers;
pub use hub::{SessionHub, Subscription};
