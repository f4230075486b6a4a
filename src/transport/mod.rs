//! Real-time transport layer.
//!
//! This module defines the uniform connection contract between the notebook
//! client and its kernel, and the three backends that implement it.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────────┐
//!                      │ dyn Transport        │
//!                      │ open / close / send  │
//!                      │ add/remove listener  │
//!                      └──────────┬───────────┘
//!            ┌────────────────────┼────────────────────┐
//!            ▼                    ▼                    ▼
//!   ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//!   │ LiveTransport   │  │ ReplayTransport │  │ BridgeTransport │
//!   │ WebSocket +     │  │ no I/O,         │  │ in-process      │
//!   │ reconnect       │  │ recorded frames │  │ ExecutionEngine │
//!   └─────────────────┘  └─────────────────┘  └─────────────────┘
//! ```
//!
//! # Contract
//!
//! - No operation blocks or calls listeners inline; outcomes arrive as
//!   events on the transport's delivery task.
//! - Listeners for one kind fire in registration order.
//! - `close()` is idempotent and produces exactly one `close` event.
//! - Nothing from a closed session is delivered after `close()` returns.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | [`WireEvent`], [`EventKind`], [`CloseEvent`] |
//! | `listeners` | [`Listener`] and [`ListenerId`] |
//! | `options` | [`LiveOptions`] reconnect policy |
//! | `live` | WebSocket-backed transport |
//! | `replay` | Pre-recorded, read-only transport |
//! | `bridge` | In-process engine transport |

// ============================================================================
// Submodules
// ============================================================================

/// In-process engine transport.
pub mod bridge;

/// Lifecycle state machine and ordered event delivery.
mod dispatch;

/// Wire event types.
pub mod event;

/// Listener registry.
pub mod listeners;

/// WebSocket transport with bounded reconnection.
pub mod live;

/// Reconnect and connection options.
pub mod options;

/// Read-only replay transport.
pub mod replay;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{BridgeTransport, EngineFactory, EngineSink, ExecutionEngine};
pub use event::{CloseEvent, EventKind, WireEvent};
pub use listeners::{Listener, ListenerId, listener};
pub use live::LiveTransport;
pub use options::LiveOptions;
pub use replay::ReplayTransport;

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadyState {
    /// Opening, or reconnecting after a drop.
    Connecting,
    /// Usable.
    Open,
    /// Close requested, teardown in progress.
    Closing,
    /// Not connected.
    Closed,
}

impl ReadyState {
    /// Returns `true` for `Connecting` and `Open`.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        })
    }
}

// ============================================================================
// TransportKind
// ============================================================================

/// Which backend a transport uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportKind {
    /// Network socket.
    Live,
    /// Pre-recorded session.
    Replay,
    /// In-process engine.
    Bridge,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "LIVE",
            Self::Replay => "REPLAY",
            Self::Bridge => "BRIDGE",
        })
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Uniform bidirectional event channel to a kernel.
///
/// Implementations never fail from `open`/`close`; problems surface as
/// `error` and `close` events.
pub trait Transport: Send + Sync {
    /// Backend variant.
    fn kind(&self) -> TransportKind;

    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Starts connecting. No-op unless `Closed`.
    fn open(&self);

    /// Closes the connection. No-op when already closing or closed.
    fn close(&self);

    /// Sends one text frame to the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// when the transport is closing or closed.
    fn send(&self, text: &str) -> Result<()>;

    /// Registers a listener for `kind`.
    fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId;

    /// Unregisters a listener. Returns `false` if it was not registered.
    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool;
}

// ============================================================================
// Tests
// ============================================================================
