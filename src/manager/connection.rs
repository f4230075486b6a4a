//! Mount-scoped connection handle.
//!
//! [`ConnectionManager::mount`] picks a transport variant, attaches the
//! caller's handlers and opens it. The returned [`Connection`] owns the
//! transport for as long as the UI mount lives.
//!
//! Tying a kernel connection to a component mount is treated as a lifecycle
//! anomaly: a second concurrent mount and every teardown are logged at
//! `warn`. Prefer [`SessionHub`](super::SessionHub) for new code.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use tracing::{debug, warn};

use crate::error::Result;
use crate::transport::{
    BridgeTransport, EngineFactory, LiveOptions, LiveTransport, ReadyState, ReplayTransport,
    Transport, TransportKind, bridge,
};

use super::handlers::{EventHandlers, Registration};

// ============================================================================
// ConnectOptions
// ============================================================================

/// What a mount asks to connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Kernel WebSocket endpoint. Only used for live connections.
    pub url: String,
    /// View an already captured session instead of a live kernel.
    pub static_session: bool,
    /// Frames replayed on open for static sessions.
    pub recording: Vec<String>,
}

impl ConnectOptions {
    /// Options for a live kernel at `url`.
    #[must_use]
    pub fn live(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Options for a static session replaying `frames`.
    #[must_use]
    pub fn replay(frames: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            static_session: true,
            recording: frames.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Chooses and builds transports.
#[derive(Clone)]
pub struct ConnectionManager {
    live: LiveOptions,
    engine: Option<EngineFactory>,
    mounts: Arc<AtomicUsize>,
}

/// Live mounts across the process.
static MOUNTS: LazyLock<Arc<AtomicUsize>> = LazyLock::new(|| Arc::new(AtomicUsize::new(0)));

impl ConnectionManager {
    /// Creates a manager using `live` for live connections.
    ///
    /// Captures the embedded engine installed at this point, if any.
    #[must_use]
    pub fn new(live: LiveOptions) -> Self {
        Self {
            live,
            engine: bridge::active_engine(),
            mounts: Arc::clone(&MOUNTS),
        }
    }

    /// Counts this manager's mounts on `counter` instead of the process-wide one.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_mount_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.mounts = counter;
        self
    }

    /// Overrides the captured embedded engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Option<EngineFactory>) -> Self {
        self.engine = engine;
        self
    }

    /// Returns the live reconnect policy.
    #[inline]
    #[must_use]
    pub fn live_options(&self) -> &LiveOptions {
        &self.live
    }

    /// Returns the variant `options` resolves to.
    ///
    /// An embedded engine wins, then a static session, then live.
    #[must_use]
    pub fn select(&self, options: &ConnectOptions) -> TransportKind {
        if self.engine.is_some() {
            TransportKind::Bridge
        } else if options.static_session {
            TransportKind::Replay
        } else {
            TransportKind::Live
        }
    }

    /// Builds a closed transport for `options`.
    pub(crate) fn create(&self, options: &ConnectOptions) -> Result<Arc<dyn Transport>> {
        let kind = self.select(options);
        debug!(%kind, url = %options.url, "Creating transport");

        let transport: Arc<dyn Transport> = match (kind, &self.engine) {
            (TransportKind::Bridge, Some(factory)) => {
                Arc::new(BridgeTransport::new(Arc::clone(factory))?)
            }
            (TransportKind::Replay, _) => {
                Arc::new(ReplayTransport::with_recording(options.recording.iter().cloned())?)
            }
            _ => Arc::new(LiveTransport::new(&options.url, self.live.clone())?),
        };
        Ok(transport)
    }

    /// Creates, wires and opens the transport for one UI mount.
    ///
    /// # Errors
    ///
    /// Fails only when the transport cannot be built (bad URL, invalid
    /// options, no runtime). Connection failures arrive as events.
    pub fn mount(&self, options: &ConnectOptions, handlers: &EventHandlers) -> Result<Connection> {
        let transport = self.create(options)?;
        let guard = MountGuard::acquire(&self.mounts);

        let registration = handlers.register(transport.as_ref());
        transport.open();

        Ok(Connection {
            transport,
            registration,
            guard: Some(guard),
        })
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("live", &self.live)
            .field("engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(LiveOptions::default())
    }
}

// ============================================================================
// MountGuard
// ============================================================================

/// Counts live mounts; warns when more than one is live.
struct MountGuard {
    counter: Arc<AtomicUsize>,
}

impl MountGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        let live = counter.fetch_add(1, Ordering::SeqCst);
        if live > 0 {
            warn!(live = live + 1, "Connection mounted while another mount is live");
        }
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Handle bound to one UI mount.
///
/// Dropping it runs the same teardown as [`unmount`](Self::unmount).
pub struct Connection {
    transport: Arc<dyn Transport>,
    registration: Registration,
    guard: Option<MountGuard>,
}

impl Connection {
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
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// once the transport is closing or closed.
    pub fn send(&self, text: &str) -> Result<()> {
        self.transport.send(text)
    }

    /// Tears the connection down with its mount.
    pub fn unmount(mut self) {
        self.teardown();
    }

    /// Warn, unregister handlers, close.
    fn teardown(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };

        warn!(
            kind = %self.transport.kind(),
            "Closing kernel connection with its UI mount"
        );
        self.registration.unregister(self.transport.as_ref());
        self.transport.close();
        drop(guard);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind())
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::error::Error;
    use crate::transport::bridge::tests::echo_factory;
    use crate::transport::testing::{LogCapture, settle};

    fn offline() -> ConnectionManager {
        ConnectionManager::new(LiveOptions::default()).with_engine(None)
    }

    #[test]
    fn test_select_order() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let replay = ConnectOptions::replay(["a"]);
        let live = ConnectOptions::live("ws://127.0.0.1:9/kernel");

        let embedded = offline().with_engine(Some(echo_factory(&shutdowns)));
        assert_eq!(embedded.select(&replay), TransportKind::Bridge);
        assert_eq!(embedded.select(&live), TransportKind::Bridge);

        assert_eq!(offline().select(&replay), TransportKind::Replay);
        assert_eq!(offline().select(&live), TransportKind::Live);
    }

    #[test]
    fn test_mount_guard_counts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = MountGuard::acquire(&counter);
        let second = MountGuard::acquire(&counter);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(first);
        drop(second);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_second_mount_and_teardown_warn() {
        const SECOND_MOUNT: &str = "Connection mounted while another mount is live";
        const TEARDOWN: &str = "Closing kernel connection with its UI mount";

        let logs = LogCapture::default();
        let _guard = logs.install();
        let counter = Arc::new(AtomicUsize::new(0));
        let manager = offline().with_mount_counter(Arc::clone(&counter));

        let first = manager
            .mount(&ConnectOptions::replay(["a"]), &EventHandlers::new())
            .expect("first mount");
        assert_eq!(logs.occurrences(SECOND_MOUNT), 0);

        let second = manager
            .mount(&ConnectOptions::replay(["b"]), &EventHandlers::new())
            .expect("second mount");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(logs.occurrences(SECOND_MOUNT), 1);
        assert!(logs.contents().contains("WARN"));

        settle().await;
        assert_eq!(first.ready_state(), ReadyState::Open);
        assert_eq!(second.ready_state(), ReadyState::Open);

        first.unmount();
        drop(second);

        assert_eq!(logs.occurrences(TEARDOWN), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mount_replay_delivers_to_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
        let handlers = EventHandlers::new()
            .on_open(move || l1.lock().push("open".to_owned()))
            .on_message(move |text| l2.lock().push(text.to_owned()));

        let connection = offline()
            .mount(&ConnectOptions::replay(["cell-1", "cell-2"]), &handlers)
            .expect("mount");
        assert_eq!(connection.kind(), TransportKind::Replay);
        assert_eq!(connection.ready_state(), ReadyState::Open);

        settle().await;
        assert_eq!(*log.lock(), ["open", "cell-1", "cell-2"]);
    }

    #[tokio::test]
    async fn test_unmount_unregisters_before_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let handlers = EventHandlers::new().on_close(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let connection = offline()
            .mount(&ConnectOptions::replay(Vec::<String>::new()), &handlers)
            .expect("mount");
        connection.unmount();
        settle().await;

        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_closes_bridge_engine() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        let handlers = EventHandlers::new().on_message(move |text| sink.lock().push(text.to_owned()));

        let manager = offline().with_engine(Some(echo_factory(&shutdowns)));
        let connection = manager
            .mount(&ConnectOptions::live("ws://unused"), &handlers)
            .expect("mount");
        assert_eq!(connection.kind(), TransportKind::Bridge);

        connection.send("print(1)").expect("send");
        settle().await;
        assert_eq!(*replies.lock(), ["PRINT(1)"]);

        drop(connection);
        settle().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mount_rejects_bad_live_url() {
        let err = offline()
            .mount(&ConnectOptions::live("http://example.com"), &EventHandlers::new())
            .expect_err("http is not a socket URL");
        assert!(matches!(err, Error::Config { .. }));
    }
}
