//! WebSocket transport with bounded automatic reconnection.
//!
//! `open()` spawns a session task that owns the socket. The task connects,
//! pumps frames, and on an unexpected drop retries the same endpoint with
//! growing delays until [`LiveOptions::max_retries`] is exceeded, at which
//! point listeners get a single terminal `close` event.
//!
//! # Session Task
//!
//! The task handles:
//!
//! - Connect attempts (bounded by `connection_timeout`)
//! - Incoming text frames → `message` events
//! - Outgoing frames from [`Transport::send`], buffered while connecting
//! - Backoff sleeps between attempts
//!
//! `close()` interrupts whichever of these is in progress.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::dispatch::EventDispatcher;
use super::event::{CloseEvent, EventKind, WireEvent};
use super::listeners::{Listener, ListenerId};
use super::options::LiveOptions;
use super::{ReadyState, Transport, TransportKind};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Commands for the session task.
enum LiveCommand {
    /// Deliver a text frame.
    Send(String),
    /// Close the socket and end the session.
    Shutdown,
}

/// How a pump over one open socket ended.
enum PumpExit {
    /// Session over; do not reconnect.
    Stopped,
    /// Socket went away; reconnect.
    Dropped(CloseEvent),
}

// ============================================================================
// LiveTransport
// ============================================================================

/// Transport backed by a WebSocket to the kernel.
pub struct LiveTransport {
    url: Url,
    options: LiveOptions,
    dispatcher: EventDispatcher,
    /// Sender into the current session task.
    commands: Mutex<Option<mpsc::UnboundedSender<LiveCommand>>>,
    /// Connect attempts made over the transport's lifetime.
    attempts: Arc<AtomicU32>,
}

impl LiveTransport {
    /// Creates a closed transport for `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Config`] if the scheme is not `ws`/`wss` or options are invalid
    /// - [`Error::Runtime`] outside a tokio runtime
    pub fn new(url: &str, options: LiveOptions) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "live transport needs a ws:// or wss:// URL, got {url}"
            )));
        }
        options.validate()?;

        Ok(Self {
            url,
            options,
            dispatcher: EventDispatcher::spawn(TransportKind::Live)?,
            commands: Mutex::new(None),
            attempts: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &LiveOptions {
        &self.options
    }

    /// Returns how many connect attempts have been made.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for LiveTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Live
    }

    fn ready_state(&self) -> ReadyState {
        self.dispatcher.ready_state()
    }

    fn open(&self) {
        let Some(epoch) = self.dispatcher.begin_open() else {
            trace!(url = %self.url, state = %self.ready_state(), "open() ignored");
            return;
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.commands.lock() = Some(command_tx);

        let session = LiveSession {
            url: self.url.to_string(),
            options: self.options.clone(),
            dispatcher: self.dispatcher.clone(),
            epoch,
            commands: command_rx,
            outbox: VecDeque::new(),
            attempts: Arc::clone(&self.attempts),
        };
        self.dispatcher.spawn_task(session.run());
    }

    fn close(&self) {
        if !self.dispatcher.begin_close() {
            return;
        }

        let delivered = self
            .commands
            .lock()
            .take()
            .is_some_and(|tx| tx.send(LiveCommand::Shutdown).is_ok());

        // Session task already gone
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
        tx.send(LiveCommand::Send(text.to_owned()))
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
// LiveSession
// ============================================================================

/// State owned by one session task (one `open()` call).
struct LiveSession {
    url: String,
    options: LiveOptions,
    dispatcher: EventDispatcher,
    epoch: u64,
    commands: mpsc::UnboundedReceiver<LiveCommand>,
    /// Frames sent while not open.
    outbox: VecDeque<String>,
    attempts: Arc<AtomicU32>,
}

impl LiveSession {
    /// Connect / pump / backoff loop.
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(url = %self.url, attempt, "Connecting");

            let Some(outcome) = self.connect().await else {
                break;
            };

            match outcome {
                Ok(stream) => {
                    failures = 0;
                    if !self.dispatcher.opened(self.epoch) {
                        break;
                    }
                    info!(url = %self.url, "WebSocket connection established");

                    match self.pump(stream).await {
                        PumpExit::Stopped => break,
                        PumpExit::Dropped(close) => {
                            warn!(url = %self.url, code = close.code, reason = %close.reason, "Connection dropped");
                            if !self.dispatcher.reconnecting(self.epoch, close) {
                                break;
                            }
                        }
                    }
                }
                Err(detail) => {
                    warn!(url = %self.url, error = %detail, "Connection attempt failed");
                    if !self.dispatcher.emit(self.epoch, WireEvent::Error(detail)) {
                        break;
                    }
                }
            }

            failures += 1;
            if failures > self.options.max_retries {
                warn!(
                    url = %self.url,
                    max_retries = self.options.max_retries,
                    "Reconnect attempts exhausted"
                );
                if self.dispatcher.terminate(
                    self.epoch,
                    CloseEvent::new(CloseEvent::ABNORMAL, "reconnect attempts exhausted"),
                ) {
                    return;
                }
                break;
            }

            let delay = self.options.reconnect_delay(failures);
            debug!(url = %self.url, retry = failures, delay_ms = delay.as_millis() as u64, "Reconnecting");
            if !self.wait(delay).await {
                break;
            }
        }

        // Completes a close() that raced with the task
        self.dispatcher.finish_close(CloseEvent::normal());
        debug!(url = %self.url, "Live session terminated");
    }

    /// Buffers a frame until the socket opens.
    fn enqueue(&mut self, text: String) {
        if self.outbox.len() >= self.options.max_queued_messages {
            warn!(
                max = self.options.max_queued_messages,
                "Outbound queue full, dropping frame"
            );
            return;
        }
        self.outbox.push_back(text);
    }

    /// One connect attempt. `None` means the session was closed meanwhile.
    async fn connect(&mut self) -> Option<StdResult<WsStream, String>> {
        let limit = self.options.connection_timeout;
        let attempt = timeout(limit, connect_async(self.url.clone()));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return Some(match result {
                        Ok(Ok((stream, _response))) => Ok(stream),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!(
                            "connection timed out after {}ms",
                            limit.as_millis()
                        )),
                    });
                }

                command = self.commands.recv() => match command {
                    Some(LiveCommand::Send(text)) => self.enqueue(text),
                    Some(LiveCommand::Shutdown) | None => return None,
                }
            }
        }
    }

    /// Sleeps between attempts. Returns `false` if the session was closed.
    async fn wait(&mut self, delay: Duration) -> bool {
        let backoff = sleep(delay);
        tokio::pin!(backoff);

        loop {
            tokio::select! {
                () = &mut backoff => return true,

                command = self.commands.recv() => match command {
                    Some(LiveCommand::Send(text)) => self.enqueue(text),
                    Some(LiveCommand::Shutdown) | None => return false,
                }
            }
        }
    }

    /// Moves frames between the socket and listeners until it ends.
    async fn pump(&mut self, stream: WsStream) -> PumpExit {
        let (mut ws_write, mut ws_read) = stream.split();

        while let Some(text) = self.outbox.pop_front() {
            if let Err(exit) = self.write(&mut ws_write, text).await {
                return exit;
            }
        }

        loop {
            tokio::select! {
                // Incoming frames from the kernel
                message = ws_read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        if !self.dispatcher.emit(self.epoch, WireEvent::Message(text.as_str().to_owned())) {
                            return PumpExit::Stopped;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let close = frame.map_or_else(
                            || CloseEvent::new(CloseEvent::NO_STATUS, ""),
                            |f| CloseEvent::new(u16::from(f.code), f.reason.as_str()),
                        );
                        debug!(code = close.code, "WebSocket closed by remote");
                        return PumpExit::Dropped(close);
                    }

                    Some(Err(e)) => {
                        self.dispatcher.emit(self.epoch, WireEvent::Error(e.to_string()));
                        return PumpExit::Dropped(CloseEvent::new(CloseEvent::ABNORMAL, e.to_string()));
                    }

                    None => {
                        return PumpExit::Dropped(CloseEvent::new(CloseEvent::ABNORMAL, "stream ended"));
                    }

                    // Ignore Binary, Ping, Pong
                    Some(Ok(_)) => {}
                },

                // Commands from the transport handle
                command = self.commands.recv() => match command {
                    Some(LiveCommand::Send(text)) => {
                        if let Err(exit) = self.write(&mut ws_write, text).await {
                            return exit;
                        }
                    }

                    Some(LiveCommand::Shutdown) | None => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                            debug!(error = %e, "Close frame not delivered");
                        }
                        let _ = ws_write.close().await;
                        return PumpExit::Stopped;
                    }
                }
            }
        }
    }

    async fn write(&self, ws_write: &mut WsSink, text: String) -> StdResult<(), PumpExit> {
        match ws_write.send(Message::Text(text.into())).await {
            Ok(()) => {
                trace!("Frame sent");
                Ok(())
            }
            Err(e) => {
                self.dispatcher.emit(self.epoch, WireEvent::Error(e.to_string()));
                Err(PumpExit::Dropped(CloseEvent::new(
                    CloseEvent::ABNORMAL,
                    e.to_string(),
                )))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
