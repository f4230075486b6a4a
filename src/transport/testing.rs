//! Test helpers for observing transport events and log output.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use super::{EventKind, Listener, Transport, WireEvent, listener};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Records every event it sees and lets a test await them in order.
pub(crate) struct EventProbe {
    tx: mpsc::UnboundedSender<WireEvent>,
    rx: mpsc::UnboundedReceiver<WireEvent>,
    log: Arc<Mutex<Vec<WireEvent>>>,
}

impl EventProbe {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a probe listening to every kind on `transport`.
    pub(crate) fn attach(transport: &dyn Transport) -> Self {
        let probe = Self::new();
        for kind in EventKind::ALL {
            transport.add_event_listener(kind, probe.listener());
        }
        probe
    }

    pub(crate) fn listener(&self) -> Listener {
        let tx = self.tx.clone();
        let log = Arc::clone(&self.log);
        listener(move |event| {
            log.lock().push(event.clone());
            let _ = tx.send(event.clone());
        })
    }

    /// Next event of any kind.
    pub(crate) async fn next(&mut self) -> WireEvent {
        timeout(EVENT_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("probe channel open")
    }

    /// Next event of `kind`, skipping others.
    pub(crate) async fn next_of(&mut self, kind: EventKind) -> WireEvent {
        loop {
            let event = self.next().await;
            if event.kind() == kind {
                return event;
            }
        }
    }

    pub(crate) fn seen(&self) -> Vec<WireEvent> {
        self.log.lock().clone()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.log.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

/// Gives delivery tasks time to drain.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Installs a test-writer subscriber once; filter via `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// In-memory log sink for asserting on diagnostics.
///
/// The subscriber is thread-scoped, so pair it with a current-thread runtime.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Routes this thread's events into the buffer until the guard drops.
    pub(crate) fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_target(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub(crate) fn occurrences(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
