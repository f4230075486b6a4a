//! Process-scoped transports keyed by session.
//!
//! The hub owns one transport per [`SessionId`] for the life of the session,
//! not of any UI component. Components [`subscribe`](SessionHub::subscribe)
//! their handlers and drop the [`Subscription`] when they go away; only
//! [`disconnect`](SessionHub::disconnect) closes the transport.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ SessionHub                               │
//! │  SessionId(a) → Arc<dyn Transport> ◄─┬── Subscription (cell view)
//! │                                      └── Subscription (status bar)
//! │  SessionId(b) → Arc<dyn Transport> ◄──── Subscription
//! └──────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identity::SessionId;
use crate::transport::{ReadyState, Transport, TransportKind};

use super::connection::{ConnectOptions, ConnectionManager};
use super::handlers::{EventHandlers, Registration};

// ============================================================================
// SessionHub
// ============================================================================

/// Registry of session transports. Cheap to clone.
#[derive(Clone)]
pub struct SessionHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    manager: ConnectionManager,
    sessions: RwLock<FxHashMap<SessionId, Arc<dyn Transport>>>,
}

static GLOBAL_HUB: OnceLock<SessionHub> = OnceLock::new();

impl SessionHub {
    /// Creates an empty hub that builds transports with `manager`.
    #[must_use]
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(HubInner {
                manager,
                sessions: RwLock::new(FxHashMap::default()),
            }),
        }
    }

    /// Returns the process-wide hub, created with default options on first use.
    pub fn global() -> &'static SessionHub {
        GLOBAL_HUB.get_or_init(|| Self::new(ConnectionManager::default()))
    }

    /// Attaches `handlers` to the transport for `session`.
    ///
    /// The first subscription creates the transport, registers its handlers
    /// and opens it. Later ones register on the existing transport and
    /// ignore `options`. A transport that closed on its own (for example
    /// after exhausting its reconnect budget) is opened again for the new
    /// subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn subscribe(
        &self,
        session: SessionId,
        options: &ConnectOptions,
        handlers: &EventHandlers,
    ) -> Result<Subscription> {
        if let Some(transport) = self.transport(session) {
            return Ok(Self::attach(session, transport, handlers));
        }

        let mut sessions = self.inner.sessions.write();
        if let Some(transport) = sessions.get(&session) {
            return Ok(Self::attach(session, Arc::clone(transport), handlers));
        }

        let transport = self.inner.manager.create(options)?;
        let subscription = Subscription::new(session, Arc::clone(&transport), handlers);
        transport.open();
        sessions.insert(session, transport);

        info!(%session, kind = %subscription.kind(), "Session transport opened");
        Ok(subscription)
    }

    /// Registers on an existing transport, reopening it if it has closed.
    fn attach(
        session: SessionId,
        transport: Arc<dyn Transport>,
        handlers: &EventHandlers,
    ) -> Subscription {
        let subscription = Subscription::new(session, transport, handlers);
        if subscription.ready_state() == ReadyState::Closed {
            subscription.transport.open();
            info!(%session, kind = %subscription.kind(), "Session transport reopened");
        }
        subscription
    }

    /// Closes and forgets the transport for `session`.
    ///
    /// Returns `false` if the session had none.
    pub fn disconnect(&self, session: SessionId) -> bool {
        let Some(transport) = self.inner.sessions.write().remove(&session) else {
            return false;
        };
        transport.close();
        debug!(%session, "Session transport closed");
        true
    }

    /// Sends one frame on the session's transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] when the session has no transport
    /// or it is closed.
    pub fn send(&self, session: SessionId, text: &str) -> Result<()> {
        self.transport(session)
            .ok_or(Error::ConnectionClosed)?
            .send(text)
    }

    /// Returns the session transport's state, if it has one.
    #[must_use]
    pub fn ready_state(&self, session: SessionId) -> Option<ReadyState> {
        self.transport(session).map(|t| t.ready_state())
    }

    /// Returns the number of sessions with a transport.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    fn transport(&self, session: SessionId) -> Option<Arc<dyn Transport>> {
        self.inner.sessions.read().get(&session).cloned()
    }
}

impl fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHub")
            .field("manager", &self.inner.manager)
            .field("sessions", &self.session_count())
            .finish()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// A component's handlers on a hub transport.
///
/// Dropping it removes the handlers; the transport stays open.
pub struct Subscription {
    session: SessionId,
    transport: Arc<dyn Transport>,
    registration: Registration,
}

impl Subscription {
    fn new(session: SessionId, transport: Arc<dyn Transport>, handlers: &EventHandlers) -> Self {
        let registration = handlers.register(transport.as_ref());
        Self {
            session,
            transport,
            registration,
        }
    }

    /// Session this subscription belongs to.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Backend variant.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.transport.ready_state()
    }

    /// Sends one text frame to the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the transport is closed.
    pub fn send(&self, text: &str) -> Result<()> {
        self.transport.send(text)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registration.unregister(self.transport.as_ref());
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("session", &self.session)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
