//! Listener registry shared by all transport variants.
//!
//! Listeners for the same kind fire in registration order. Dispatch works on
//! a snapshot, so a listener may add or remove listeners (including itself)
//! without deadlocking; the change takes effect from the next event.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::event::{EventKind, WireEvent};

// ============================================================================
// Types
// ============================================================================

/// Event listener callback.
pub type Listener = Arc<dyn Fn(&WireEvent) + Send + Sync>;

/// Handle returned by `add_event_listener`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Wraps a closure as a [`Listener`].
#[inline]
pub fn listener(f: impl Fn(&WireEvent) + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Per-kind ordered listener lists.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    slots: RwLock<FxHashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut slots = self.slots.write();
        let Some(list) = slots.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.slots.read().get(&kind).map_or(0, Vec::len)
    }

    /// Calls every listener registered for the event's kind.
    pub(crate) fn dispatch(&self, event: &WireEvent) {
        self.dispatch_while(event, || true);
    }

    /// Like [`dispatch`](Self::dispatch), but checks `live` before each
    /// listener and stops at the first `false`.
    pub(crate) fn dispatch_while(&self, event: &WireEvent, live: impl Fn() -> bool) {
        let snapshot: Vec<Listener> = {
            let slots = self.slots.read();
            match slots.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return,
            }
        };

        for listener in snapshot {
            if !live() {
                return;
            }
            listener(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener(move |event| {
            if let Some(text) = event.as_message() {
                log.lock().push(format!("{tag}:{text}"));
            }
        })
    }

    #[test]
    fn test_remove_unknown_listener() {
        let registry = ListenerRegistry::default();
        let id = registry.add(EventKind::Open, listener(|_| {}));
        assert!(!registry.remove(EventKind::Close, id));
        assert!(registry.remove(EventKind::Open, id));
        assert!(!registry.remove(EventKind::Open, id));
    }

    #[test]
    fn test_dispatch_only_matching_kind() {
        let registry = ListenerRegistry::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.add(EventKind::Message, recorder(&log, "m"));
        registry.add(EventKind::Error, recorder(&log, "e"));

        registry.dispatch(&WireEvent::Message("hi".into()));
        registry.dispatch(&WireEvent::Open);

        assert_eq!(*log.lock(), ["m:hi"]);
    }

    #[test]
    fn test_listener_can_remove_itself() {
        let registry = Arc::new(ListenerRegistry::default());
        let calls = Arc::new(Mutex::new(0));
        let slot = Arc::new(Mutex::new(None));

        let id = {
            let inner = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            registry.add(
                EventKind::Open,
                listener(move |_| {
                    *calls.lock() += 1;
                    if let Some(id) = slot.lock().take() {
                        inner.remove(EventKind::Open, id);
                    }
                }),
            )
        };
        *slot.lock() = Some(id);

        registry.dispatch(&WireEvent::Open);
        registry.dispatch(&WireEvent::Open);

        assert_eq!(*calls.lock(), 1);
        assert_eq!(registry.count(EventKind::Open), 0);
    }

    proptest! {
        #[test]
        fn prop_registration_order_preserved(listeners in 1usize..8, messages in 1usize..16) {
            let registry = ListenerRegistry::default();
            let log = Arc::new(Mutex::new(Vec::new()));

            for index in 0..listeners {
                let log = Arc::clone(&log);
                registry.add(EventKind::Message, listener(move |event| {
                    if let Some(text) = event.as_message() {
                        log.lock().push((text.to_owned(), index));
                    }
                }));
            }

            for n in 0..messages {
                registry.dispatch(&WireEvent::Message(n.to_string()));
            }

            let expected: Vec<_> = (0..messages)
                .flat_map(|n| (0..listeners).map(move |index| (n.to_string(), index)))
                .collect();
            prop_assert_eq!(&*log.lock(), &expected);
        }
    }
}
