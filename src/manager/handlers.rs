//! Caller-supplied lifecycle handlers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::transport::{CloseEvent, EventKind, Listener, ListenerId, Transport, WireEvent, listener};

// ============================================================================
// EventHandlers
// ============================================================================

/// The open/message/close/error handlers a UI component attaches.
///
/// # Example
///
/// ```ignore
/// let handlers = EventHandlers::new()
///     .on_open(|| println!("kernel connected"))
///     .on_message(|text| println!("<- {text}"))
///     .on_close(|close| println!("closed with {}", close.code));
/// ```
#[derive(Clone, Default)]
pub struct EventHandlers {
    open: Option<Listener>,
    message: Option<Listener>,
    close: Option<Listener>,
    error: Option<Listener>,
}

impl EventHandlers {
    /// Creates an empty handler set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the connection opens.
    #[must_use]
    pub fn on_open(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.open = Some(listener(move |_| handler()));
        self
    }

    /// Called with each inbound text frame.
    #[must_use]
    pub fn on_message(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.message = Some(listener(move |event| {
            if let Some(text) = event.as_message() {
                handler(text);
            }
        }));
        self
    }

    /// Called when the connection closes.
    #[must_use]
    pub fn on_close(mut self, handler: impl Fn(&CloseEvent) + Send + Sync + 'static) -> Self {
        self.close = Some(listener(move |event| {
            if let Some(close) = event.as_close() {
                handler(close);
            }
        }));
        self
    }

    /// Called with the detail of each transport error.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Some(listener(move |event| {
            if let WireEvent::Error(detail) = event {
                handler(detail);
            }
        }));
        self
    }

    /// Returns `true` if no handler is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn iter(&self) -> impl Iterator<Item = (EventKind, &Listener)> {
        [
            (EventKind::Open, &self.open),
            (EventKind::Message, &self.message),
            (EventKind::Close, &self.close),
            (EventKind::Error, &self.error),
        ]
        .into_iter()
        .filter_map(|(kind, slot)| slot.as_ref().map(|l| (kind, l)))
    }

    /// Registers every set handler on `transport`.
    pub(crate) fn register(&self, transport: &dyn Transport) -> Registration {
        let ids = self
            .iter()
            .map(|(kind, l)| (kind, transport.add_event_listener(kind, l.clone())))
            .collect();
        Registration { ids }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("open", &self.open.is_some())
            .field("message", &self.message.is_some())
            .field("close", &self.close.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Listener ids produced by [`EventHandlers::register`].
#[derive(Debug, Default)]
pub(crate) struct Registration {
    ids: Vec<(EventKind, ListenerId)>,
}

impl Registration {
    /// Removes every listener this registration added.
    pub(crate) fn unregister(&mut self, transport: &dyn Transport) {
        for (kind, id) in self.ids.drain(..) {
            transport.remove_event_listener(kind, id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::transport::ReplayTransport;
    use crate::transport::testing::settle;

    #[test]
    fn test_empty_handlers() {
        let handlers = EventHandlers::new();
        assert!(handlers.is_empty());
        assert!(!handlers.on_error(|_| {}).is_empty());
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let transport = ReplayTransport::with_recording(["x"]).expect("transport");
        let log = Arc::new(Mutex::new(Vec::new()));

        let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
        let handlers = EventHandlers::new()
            .on_open(move || l1.lock().push("open".to_owned()))
            .on_message(move |text| l2.lock().push(text.to_owned()));

        let mut registration = handlers.register(&transport);
        assert_eq!(registration.len(), 2);

        transport.open();
        settle().await;
        assert_eq!(*log.lock(), ["open", "x"]);

        registration.unregister(&transport);
        assert_eq!(registration.len(), 0);

        transport.close();
        transport.open();
        settle().await;
        assert_eq!(log.lock().len(), 2);
    }
}
