//! Read-only transport for viewing an already captured session.
//!
//! Performs no I/O. `open()` is a local state change that delivers `open`
//! followed by the recorded frames; `close()` goes straight to closed.
//! There is nothing to reconnect to, and no `error` event is ever produced.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::dispatch::EventDispatcher;
use super::event::{CloseEvent, EventKind, WireEvent};
use super::listeners::{Listener, ListenerId};
use super::{ReadyState, Transport, TransportKind};

// ============================================================================
// ReplayTransport
// ============================================================================

/// Transport replaying a fixed sequence of kernel frames.
pub struct ReplayTransport {
    dispatcher: EventDispatcher,
    recording: Arc<[String]>,
}

impl ReplayTransport {
    /// Creates a transport with nothing to replay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_recording(Vec::<String>::new())
    }

    /// Creates a transport that replays `frames` on every open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn with_recording(frames: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        Ok(Self {
            dispatcher: EventDispatcher::spawn(TransportKind::Replay)?,
            recording: frames.into_iter().map(Into::into).collect(),
        })
    }

    /// Returns the recorded frames.
    #[inline]
    #[must_use]
    pub fn recording(&self) -> &[String] {
        &self.recording
    }
}

impl Transport for ReplayTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Replay
    }

    fn ready_state(&self) -> ReadyState {
        self.dispatcher.ready_state()
    }

    fn open(&self) {
        let Some(epoch) = self.dispatcher.begin_open() else {
            return;
        };
        self.dispatcher.opened(epoch);

        for frame in self.recording.iter() {
            if !self.dispatcher.emit(epoch, WireEvent::Message(frame.clone())) {
                break;
            }
        }
        debug!(frames = self.recording.len(), "Replay session opened");
    }

    fn close(&self) {
        if self.dispatcher.begin_close() {
            self.dispatcher.finish_close(CloseEvent::normal());
        }
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::ConnectionClosed);
        }
        trace!(len = text.len(), "Replay session discarded outbound frame");
        Ok(())
    }

    fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.dispatcher.listeners().add(kind, listener)
    }

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.dispatcher.listeners().remove(kind, id)
    }
}

// ============================================================================
// Tests
// ============================================================================
