//! Lifecycle state and ordered event delivery.
//!
//! Every transport owns one [`EventDispatcher`]. It keeps the ready state
//! and a session epoch under a single lock, and queues events onto a channel
//! drained by a delivery task. Listeners only ever run on that task.
//!
//! # Sessions
//!
//! Each successful `open` starts a new session (epoch). Backends tag what
//! they produce with the epoch they were opened under; once `close` bumps the
//! epoch, anything still queued for the old session is discarded at delivery
//! time, and re-checked before each listener call, so a listener that closes
//! the transport stops the rest from seeing the event. Close events produced
//! by a state transition are always delivered.
//!
//! When `close` runs on another thread, a listener call that already started
//! for the old session still completes; no further call for it begins once
//! `close` has returned.
//!
//! ```text
//!            begin_open              opened
//!   CLOSED ─────────────► CONNECTING ───────► OPEN
//!     ▲                     ▲    │              │
//!     │      reconnecting   │    │ terminate    │
//!     │      ◄──────────────┼────┼──────────────┘
//!     │                          ▼
//!     └──── finish_close ── CLOSING ◄── begin_close
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};

use super::event::{CloseEvent, WireEvent};
use super::listeners::ListenerRegistry;
use super::{ReadyState, TransportKind};

// ============================================================================
// Types
// ============================================================================

struct Lifecycle {
    state: ReadyState,
    epoch: u64,
}

struct Envelope {
    epoch: u64,
    forced: bool,
    event: WireEvent,
}

struct Shared {
    kind: TransportKind,
    listeners: ListenerRegistry,
    lifecycle: Mutex<Lifecycle>,
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Shared lifecycle + delivery queue for one transport instance.
#[derive(Clone)]
pub(crate) struct EventDispatcher {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Envelope>,
    runtime: Handle,
}

impl EventDispatcher {
    /// Creates a dispatcher and spawns its delivery task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub(crate) fn spawn(kind: TransportKind) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::runtime(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            kind,
            listeners: ListenerRegistry::default(),
            lifecycle: Mutex::new(Lifecycle {
                state: ReadyState::Closed,
                epoch: 0,
            }),
        });

        handle.spawn(Self::run_delivery(Arc::clone(&shared), rx));

        Ok(Self {
            shared,
            tx,
            runtime: handle,
        })
    }

    /// Spawns a backend task on the runtime the transport was created in.
    pub(crate) fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(task);
    }

    /// Delivery loop; ends when every dispatcher clone is gone.
    async fn run_delivery(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            if envelope.forced {
                shared.listeners.dispatch(&envelope.event);
                continue;
            }

            let current = || shared.lifecycle.lock().epoch == envelope.epoch;
            if !current() {
                trace!(kind = %shared.kind, event = %envelope.event.kind(), "Dropped stale event");
                continue;
            }
            shared.listeners.dispatch_while(&envelope.event, current);
        }

        trace!(kind = %shared.kind, "Event delivery terminated");
    }

    #[inline]
    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.shared.listeners
    }

    #[inline]
    pub(crate) fn ready_state(&self) -> ReadyState {
        self.shared.lifecycle.lock().state
    }

    /// Returns `true` while `epoch` is the live session.
    #[inline]
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        let lifecycle = self.shared.lifecycle.lock();
        lifecycle.epoch == epoch && lifecycle.state.is_active()
    }

    fn queue(&self, epoch: u64, forced: bool, event: WireEvent) {
        trace!(kind = %self.shared.kind, event = %event.kind(), epoch, "Event queued");
        let _ = self.tx.send(Envelope {
            epoch,
            forced,
            event,
        });
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// `CLOSED → CONNECTING`. Returns the new session epoch.
    pub(crate) fn begin_open(&self) -> Option<u64> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != ReadyState::Closed {
            return None;
        }
        lifecycle.state = ReadyState::Connecting;
        lifecycle.epoch += 1;
        Some(lifecycle.epoch)
    }

    /// `CONNECTING → OPEN`, queuing an open event.
    pub(crate) fn opened(&self, epoch: u64) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.epoch != epoch || lifecycle.state != ReadyState::Connecting {
            return false;
        }
        lifecycle.state = ReadyState::Open;
        self.queue(epoch, false, WireEvent::Open);
        true
    }

    /// `OPEN → CONNECTING` after the backend dropped, queuing its close.
    pub(crate) fn reconnecting(&self, epoch: u64, close: CloseEvent) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.epoch != epoch || lifecycle.state != ReadyState::Open {
            return false;
        }
        lifecycle.state = ReadyState::Connecting;
        self.queue(epoch, false, WireEvent::Close(close));
        true
    }

    /// Queues a message or error for the session opened at `epoch`.
    ///
    /// Returns `false` once that session is over.
    pub(crate) fn emit(&self, epoch: u64, event: WireEvent) -> bool {
        let lifecycle = self.shared.lifecycle.lock();
        if lifecycle.epoch != epoch || !lifecycle.state.is_active() {
            return false;
        }
        self.queue(epoch, false, event);
        true
    }

    /// `CONNECTING | OPEN → CLOSING`, ending the current session.
    pub(crate) fn begin_close(&self) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if !lifecycle.state.is_active() {
            return false;
        }
        lifecycle.state = ReadyState::Closing;
        lifecycle.epoch += 1;
        true
    }

    /// `CLOSING → CLOSED`, queuing the close event.
    pub(crate) fn finish_close(&self, close: CloseEvent) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != ReadyState::Closing {
            return false;
        }
        lifecycle.state = ReadyState::Closed;
        self.queue(lifecycle.epoch, true, WireEvent::Close(close));
        true
    }

    /// Backend-initiated terminal close of the session opened at `epoch`.
    pub(crate) fn terminate(&self, epoch: u64, close: CloseEvent) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.epoch != epoch || !lifecycle.state.is_active() {
            return false;
        }
        lifecycle.state = ReadyState::Closed;
        self.queue(epoch, true, WireEvent::Close(close));
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
