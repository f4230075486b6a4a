//! Wire event types.
//!
//! Events are what a transport reports to its listeners. Every backing
//! variant produces the same four kinds.
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `open` | Connection usable |
//! | `message` | One text frame from the kernel |
//! | `close` | Connection gone (code + reason) |
//! | `error` | Something failed; does not close by itself |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// EventKind
// ============================================================================

/// Event kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Connection opened.
    Open,
    /// Text frame received.
    Message,
    /// Connection closed.
    Close,
    /// Failure report.
    Error,
}

impl EventKind {
    /// All kinds, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Open, Self::Message, Self::Close, Self::Error];

    /// Returns the DOM-style event name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Close => "close",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Close code and reason, following RFC 6455 numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    /// Close code.
    pub code: u16,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseEvent {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Close frame carried no status code.
    pub const NO_STATUS: u16 = 1005;
    /// Connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;
    /// Backend hit an unexpected condition.
    pub const INTERNAL_ERROR: u16 = 1011;

    /// Creates a close event.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Creates a normal (1000) close event with no reason.
    #[inline]
    #[must_use]
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "")
    }

    /// Returns `true` for code 1000.
    #[inline]
    #[must_use]
    pub const fn is_normal(&self) -> bool {
        self.code == Self::NORMAL
    }
}

// ============================================================================
// WireEvent
// ============================================================================

/// An event delivered to transport listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// Connection opened.
    Open,
    /// Raw text frame.
    Message(String),
    /// Connection closed.
    Close(CloseEvent),
    /// Failure detail.
    Error(String),
}

impl WireEvent {
    /// Returns the kind listeners subscribe with.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Close(_) => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Returns the frame text for message events.
    #[inline]
    #[must_use]
    pub fn as_message(&self) -> Option<&str> {
        match self {
            Self::Message(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the close details for close events.
    #[inline]
    #[must_use]
    pub const fn as_close(&self) -> Option<&CloseEvent> {
        match self {
            Self::Close(close) => Some(close),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
