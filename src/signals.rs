//! Independently debounced handlers keyed by signal name.
//!
//! Consumers discover a set of signal names at runtime (for example the
//! selection signals a chart declares) and attach one handler per name.
//! Bursts of [`trigger`](SignalDebouncer::trigger) calls for a name collapse
//! into a single call carrying the last value, `delay` after the burst ends.
//! Names never delay each other.
//!
//! # Example
//!
//! ```no_run
//! use notebook_link::signals::SignalDebouncer;
//!
//! # async fn example() -> notebook_link::Result<()> {
//! let debouncer = SignalDebouncer::new()?;
//! for name in ["brush", "click"] {
//!     debouncer.register(name, move |value: serde_json::Value| {
//!         println!("{name} -> {value}");
//!     });
//! }
//! debouncer.trigger("brush", serde_json::json!([0, 10]));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Quiet period before a handler fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

// ============================================================================
// SignalDebouncer
// ============================================================================

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Slot<T> {
    handler: Handler<T>,
    timer: Mutex<Timer>,
}

#[derive(Default)]
struct Timer {
    pending: Option<JoinHandle<()>>,
    retired: bool,
}

impl<T: Send + 'static> Slot<T> {
    fn new(handler: Handler<T>) -> Self {
        Self {
            handler,
            timer: Mutex::new(Timer::default()),
        }
    }

    /// Restarts the timer. Returns `false` once the slot is retired.
    fn schedule(&self, runtime: &Handle, delay: Duration, value: T) -> bool {
        let mut timer = self.timer.lock();
        if timer.retired {
            return false;
        }
        if let Some(previous) = timer.pending.take() {
            previous.abort();
        }
        let handler = Arc::clone(&self.handler);
        timer.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            handler(value);
        }));
        true
    }
}

impl<T> Slot<T> {
    /// Drops the pending call and refuses later ones.
    fn retire(&self) {
        let mut timer = self.timer.lock();
        timer.retired = true;
        if let Some(pending) = timer.pending.take() {
            pending.abort();
        }
    }
}

/// Trailing-edge debouncer with one timer per signal name.
pub struct SignalDebouncer<T> {
    delay: Duration,
    runtime: Handle,
    slots: RwLock<FxHashMap<String, Arc<Slot<T>>>>,
}

impl<T: Send + 'static> SignalDebouncer<T> {
    /// Creates a debouncer with [`DEFAULT_DEBOUNCE`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_delay(DEFAULT_DEBOUNCE)
    }

    /// Creates a debouncer waiting `delay` after the last trigger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] outside a tokio runtime.
    pub fn with_delay(delay: Duration) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::runtime(format!("signal debouncer needs a tokio runtime: {e}")))?;

        Ok(Self {
            delay,
            runtime,
            slots: RwLock::new(FxHashMap::default()),
        })
    }

    /// Returns the quiet period.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Attaches `handler` to `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, handler: impl Fn(T) + Send + Sync + 'static) {
        let name = name.into();
        let slot = Arc::new(Slot::new(Arc::new(handler)));

        if let Some(previous) = self.slots.write().insert(name.clone(), slot) {
            previous.retire();
        }
        debug!(signal = %name, "Signal handler registered");
    }

    /// Detaches the handler for `name`, dropping any pending call.
    pub fn unregister(&self, name: &str) -> bool {
        match self.slots.write().remove(name) {
            Some(slot) => {
                slot.retire();
                true
            }
            None => false,
        }
    }

    /// Schedules the handler for `name` with `value`, restarting its timer.
    ///
    /// Returns `false` if no handler is registered for `name`.
    pub fn trigger(&self, name: &str, value: T) -> bool {
        let Some(slot) = self.slots.read().get(name).cloned() else {
            trace!(signal = name, "Trigger for unknown signal ignored");
            return false;
        };
        // The slot may have been unregistered since the lookup.
        slot.schedule(&self.runtime, self.delay, value)
    }

    /// Returns `true` if `name` has a handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Returns the registered signal names.
    #[must_use]
    pub fn signals(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }
}

impl<T> Drop for SignalDebouncer<T> {
    fn drop(&mut self) {
        for slot in self.slots.get_mut().values() {
            slot.retire();
        }
    }
}

impl<T> fmt::Debug for SignalDebouncer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalDebouncer")
            .field("delay", &self.delay)
            .field("signals", &self.slots.read().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    const DELAY: Duration = Duration::from_millis(30);
    const QUIET: Duration = Duration::from_millis(150);

    fn recording(debouncer: &SignalDebouncer<u32>, name: &'static str) -> Arc<Mutex<Vec<(String, u32)>>> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        debouncer.register(name, move |value| sink.lock().push((name.to_owned(), value)));
        calls
    }

    #[test]
    fn test_requires_runtime() {
        assert_err!(SignalDebouncer::<u32>::new());
    }

    #[tokio::test]
    async fn test_burst_collapses_to_last_value() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let calls = recording(&debouncer, "brush");

        for value in 1..=5 {
            assert!(debouncer.trigger("brush", value));
        }
        sleep(QUIET).await;

        assert_eq!(*calls.lock(), [("brush".to_owned(), 5)]);
    }

    #[tokio::test]
    async fn test_names_debounce_independently() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let brush = recording(&debouncer, "brush");
        let click = recording(&debouncer, "click");

        debouncer.trigger("brush", 1);
        debouncer.trigger("click", 10);
        debouncer.trigger("brush", 2);
        sleep(QUIET).await;

        assert_eq!(*brush.lock(), [("brush".to_owned(), 2)]);
        assert_eq!(*click.lock(), [("click".to_owned(), 10)]);
    }

    #[tokio::test]
    async fn test_unknown_and_unregistered_signals() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let calls = recording(&debouncer, "brush");

        assert!(!debouncer.trigger("hover", 1));

        debouncer.trigger("brush", 1);
        assert!(debouncer.unregister("brush"));
        assert!(!debouncer.unregister("brush"));
        assert!(!debouncer.contains("brush"));
        sleep(QUIET).await;

        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_separated_triggers_fire_separately() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let calls = recording(&debouncer, "brush");

        debouncer.trigger("brush", 1);
        sleep(QUIET).await;
        debouncer.trigger("brush", 2);
        sleep(QUIET).await;

        assert_eq!(calls.lock().len(), 2);
        assert_eq!(debouncer.signals(), ["brush"]);
    }

    #[tokio::test]
    async fn test_trigger_after_unregister_on_stale_slot() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let calls = recording(&debouncer, "brush");

        // A trigger that looked the slot up just before unregister removed it.
        let stale = debouncer.slots.read().get("brush").cloned().expect("slot");
        assert!(debouncer.unregister("brush"));

        assert!(!stale.schedule(&debouncer.runtime, DELAY, 7));
        sleep(QUIET).await;

        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reregister_drops_pending_call() {
        let debouncer = assert_ok!(SignalDebouncer::with_delay(DELAY));
        let old = recording(&debouncer, "brush");

        debouncer.trigger("brush", 1);
        let new = recording(&debouncer, "brush");
        sleep(QUIET).await;

        assert!(old.lock().is_empty());
        assert!(new.lock().is_empty());

        debouncer.trigger("brush", 2);
        sleep(QUIET).await;
        assert_eq!(*new.lock(), [("brush".to_owned(), 2)]);
    }
}
