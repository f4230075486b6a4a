//! Transport routed through an in-process execution engine.
//!
//! Used when the kernel runs embedded in the client process instead of
//! behind a network endpoint. Outbound frames become calls into the engine;
//! whatever the engine pushes into its [`EngineSink`] is delivered to
//! listeners as `message` events.
//!
//! The "connection" lives exactly as long as the engine instance created by
//! `open()`; `close()` shuts that instance down. There is no reconnection.
//!
//! # Embedded Environment
//!
//! An application hosting an engine installs a factory once with
//! [`install_engine`]. The connection manager checks [`active_engine`] and
//! prefers this transport whenever one is installed.
//!
//! ```ignore
//! use std::sync::Arc;
//! use notebook_link::transport::bridge;
//!
//! bridge::install_engine(Arc::new(|| Box::new(MyInterpreter::default())));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::dispatch::EventDispatcher;
use super::event::{CloseEvent, EventKind, WireEvent};
use super::listeners::{Listener, ListenerId};
use super::{ReadyState, Transport, TransportKind};

// ============================================================================
// ExecutionEngine
// ============================================================================

/// An embedded interpreter acting as the kernel.
#[async_trait]
pub trait ExecutionEngine: Send + 'static {
    /// Boots the engine. `sink` stays valid for the whole session.
    async fn start(&mut self, sink: EngineSink) -> Result<()>;

    /// Handles one outbound frame from the client.
    async fn call(&mut self, message: String) -> Result<()>;

    /// Releases the engine. Called once, when the transport closes.
    async fn shutdown(&mut self) {}
}

/// Creates a fresh engine per `open()`.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn ExecutionEngine> + Send + Sync>;

// ============================================================================
// EngineSink
// ============================================================================

/// Injects engine output into the transport as `message` events.
#[derive(Clone)]
pub struct EngineSink {
    dispatcher: EventDispatcher,
    epoch: u64,
}

impl EngineSink {
    /// Delivers `text` to listeners.
    ///
    /// Returns `false` once the session has been closed.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.dispatcher
            .emit(self.epoch, WireEvent::Message(text.into()))
    }

    /// Returns `true` while the session is open or starting.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.dispatcher.is_current(self.epoch)
    }
}

impl fmt::Debug for EngineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSink")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Embedded environment
// ============================================================================

static ACTIVE_ENGINE: RwLock<Option<EngineFactory>> = RwLock::new(None);

/// Marks the process as hosting an embedded engine.
pub fn install_engine(factory: EngineFactory) {
    *ACTIVE_ENGINE.write() = Some(factory);
    info!("Embedded execution engine installed");
}

/// Removes the installed engine factory, returning it.
pub fn uninstall_engine() -> Option<EngineFactory> {
    ACTIVE_ENGINE.write().take()
}

/// Returns the installed engine factory, if any.
#[must_use]
pub fn active_engine() -> Option<EngineFactory> {
    ACTIVE_ENGINE.read().clone()
}

// ============================================================================
// BridgeTransport
// ============================================================================

/// Commands for the engine task.
enum BridgeCommand {
    Call(String),
    Shutdown,
}

/// Transport whose kernel is an in-process [`ExecutionEngine`].
pub struct BridgeTransport {
    factory: EngineFactory,
    dispatcher: EventDispatcher,
    commands: Mutex<Option<mpsc::UnboundedSender<BridgeCommand>>>,
}

impl BridgeTransport {
    /// Creates a closed transport that will build engines with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn new(factory: EngineFactory) -> Result<Self> {
        Ok(Self {
            factory,
            dispatcher: EventDispatcher::spawn(TransportKind::Bridge)?,
            commands: Mutex::new(None),
        })
    }

    /// Engine task: start, serve calls, shut down.
    async fn run_engine(
        mut engine: Box<dyn ExecutionEngine>,
        dispatcher: EventDispatcher,
        epoch: u64,
        mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
    ) {
        let sink = EngineSink {
            dispatcher: dispatcher.clone(),
            epoch,
        };

        if let Err(e) = engine.start(sink).await {
            warn!(error = %e, "Engine failed to start");
            dispatcher.emit(epoch, WireEvent::Error(e.to_string()));
            let terminated = dispatcher.terminate(
                epoch,
                CloseEvent::new(CloseEvent::INTERNAL_ERROR, "engine failed to start"),
            );
            engine.shutdown().await;
            if !terminated {
                dispatcher.finish_close(CloseEvent::normal());
            }
            return;
        }

        if dispatcher.opened(epoch) {
            debug!("Engine session opened");
            while let Some(BridgeCommand::Call(message)) = commands.recv().await {
                if let Err(e) = engine.call(message).await {
                    warn!(error = %e, "Engine call failed");
                    dispatcher.emit(epoch, WireEvent::Error(e.to_string()));
                }
            }
        }

        engine.shutdown().await;
        dispatcher.finish_close(CloseEvent::normal());
        debug!("Engine session terminated");
    }
}

impl Transport for BridgeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bridge
    }

    fn ready_state(&self) -> ReadyState {
        self.dispatcher.ready_state()
    }

    fn open(&self) {
        let Some(epoch) = self.dispatcher.begin_open() else {
            return;
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.commands.lock() = Some(command_tx);

        let engine = (self.factory)();
        self.dispatcher.spawn_task(Self::run_engine(
            engine,
            self.dispatcher.clone(),
            epoch,
            command_rx,
        ));
    }

    fn close(&self) {
        if !self.dispatcher.begin_close() {
            return;
        }

        let delivered = self
            .commands
            .lock()
            .take()
            .is_some_and(|tx| tx.send(BridgeCommand::Shutdown).is_ok());

        if !delivered {
            self.dispatcher.finish_close(CloseEvent::normal());
        }
    }

    fn send(&self, text: &str) -> Result<()> {
        if !self.ready_state().is_active() {
            return Err(Error::ConnectionClosed);
        }

        let commands = self.commands.lock();
        let tx = commands.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(BridgeCommand::Call(text.to_owned()))
            .map_err(|_| Error::ConnectionClosed)
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
