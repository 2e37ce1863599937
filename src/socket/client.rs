//! Connection lifecycle for `WebSocketClient`.
//!
//! LIFECYCLE
//! =========
//! 1. `connect` → `Connecting`, dial with timeout
//! 2. Success → `Connected`, spawn reader + writer, fire `on_open`
//!    Failure → `Disconnected`, fire `on_error`, return the error
//! 3. Reader delivers text/binary payloads to `on_message`
//! 4. Stream ends (close frame, EOF, or error) → `Closed`, fire `on_close`
//!
//! A dropped `connect` future falls back to `Disconnected`. A local `close`
//! waits at most `close_timeout` for the peer's reply before ending the
//! connection anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::{CloseInfo, ConnectionState, Payload, SocketError, Transition};
use crate::config::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type OpenHandler = Arc<dyn Fn() + Send + Sync>;
type CloseHandler = Arc<dyn Fn(&CloseInfo) + Send + Sync>;
type MessageHandler = Arc<dyn Fn(&Payload) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&SocketError) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    open: Vec<OpenHandler>,
    close: Vec<CloseHandler>,
    message: Vec<MessageHandler>,
    error: Vec<ErrorHandler>,
}

/// Per-connection plumbing shared by the handle and the reader task.
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    closing: AtomicBool,
    close_requested: Notify,
}

struct Inner {
    config: ClientConfig,
    state: watch::Sender<ConnectionState>,
    handlers: Mutex<Handlers>,
    /// Present only while `Connected`.
    link: Mutex<Option<Arc<Link>>>,
}

/// Returns a dial that never reached `Opened` to `Disconnected` when dropped.
struct DialGuard<'a> {
    client: &'a WebSocketClient,
    armed: bool,
}

impl DialGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DialGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.client.transition(Transition::Failed) {
            Ok(_) => info!("ws: connect cancelled"),
            Err(e) => debug!(error = %e, "ws: cancelled dial already settled"),
        }
    }
}

/// Clonable handle to one WebSocket endpoint. Clones share state and handlers.
#[derive(Clone)]
pub struct WebSocketClient {
    inner: Arc<Inner>,
}

// =============================================================================
// REGISTRATION
// =============================================================================

impl WebSocketClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: watch::Sender::new(ConnectionState::Disconnected),
                handlers: Mutex::new(Handlers::default()),
                link: Mutex::new(None),
            }),
        }
    }

    pub fn on_open<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers().open.push(Arc::new(handler));
    }

    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        self.handlers().close.push(Arc::new(handler));
    }

    /// Called once per inbound text or binary message with its payload.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.handlers().message.push(Arc::new(handler));
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&SocketError) + Send + Sync + 'static,
    {
        self.handlers().error.push(Arc::new(handler));
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Resolve once no connection is live or pending.
    pub async fn closed(&self) -> ConnectionState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|state| state.is_idle()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

impl WebSocketClient {
    pub async fn connect(&self) -> Result<(), SocketError> {
        self.transition(Transition::Connect)?;
        let guard = DialGuard { client: self, armed: true };

        let url = self.inner.config.url.as_str();
        let timeout = self.inner.config.connect_timeout;
        info!(%url, "ws: connecting");

        let stream = match tokio::time::timeout(timeout, connect_async(url)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                guard.disarm();
                return Err(self.fail(SocketError::Connect(Box::new(e))));
            }
            Err(_) => {
                guard.disarm();
                return Err(self.fail(SocketError::ConnectTimeout(timeout)));
            }
        };
        guard.disarm();

        let (sink, stream) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Link { outbound: tx, closing: AtomicBool::new(false), close_requested: Notify::new() });
        *self.link() = Some(Arc::clone(&link));

        if let Err(e) = self.transition(Transition::Opened) {
            self.link().take();
            return Err(e);
        }
        info!(%url, "ws: connected");
        self.emit_open();

        tokio::spawn(write_loop(self.clone(), sink, rx));
        tokio::spawn(read_loop(self.clone(), stream, link));
        Ok(())
    }

    /// Queue one outbound message.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<(), SocketError> {
        let state = self.state();
        if state != ConnectionState::Connected {
            return Err(SocketError::NotConnected(state));
        }
        let Some(link) = self.link().clone() else {
            return Err(SocketError::NotConnected(state));
        };
        if link.closing.load(Ordering::Acquire) {
            return Err(SocketError::Closing);
        }
        link.outbound
            .send(payload.into().into_message())
            .map_err(|_| SocketError::NotConnected(self.state()))
    }

    /// Start the close handshake. `on_close` fires when the peer answers or
    /// `close_timeout` passes, whichever is first.
    pub fn close(&self) -> Result<(), SocketError> {
        match self.state() {
            ConnectionState::Closed => Ok(()),
            ConnectionState::Disconnected => self.transition(Transition::Closed).map(|_| ()),
            ConnectionState::Connecting => Err(SocketError::InvalidTransition {
                from: ConnectionState::Connecting,
                transition: Transition::Closed,
            }),
            ConnectionState::Connected => {
                let Some(link) = self.link().clone() else {
                    return Ok(());
                };
                if link.closing.swap(true, Ordering::AcqRel) {
                    return Ok(());
                }
                let frame = CloseFrame { code: CloseCode::Normal, reason: "".into() };
                if link.outbound.send(Message::Close(Some(frame))).is_err() {
                    debug!("ws: writer already gone, close frame not queued");
                }
                link.close_requested.notify_one();
                Ok(())
            }
        }
    }

    /// Apply `transition` atomically; observers of `watch_state` see the result.
    fn transition(&self, transition: Transition) -> Result<ConnectionState, SocketError> {
        let mut outcome = Err(SocketError::NotConnected(self.state()));
        self.inner.state.send_if_modified(|state| match state.on(transition) {
            Ok(next) => {
                debug!(from = %state, to = %next, ?transition, "ws: state change");
                *state = next;
                outcome = Ok(next);
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Connect attempt failed: back to `Disconnected` and report.
    fn fail(&self, err: SocketError) -> SocketError {
        if let Err(e) = self.transition(Transition::Failed) {
            debug!(error = %e, "ws: failed transition rejected");
        }
        self.emit_error(&err);
        err
    }

    /// Reader finished: drop the writer, move to `Closed`, notify.
    fn finish(&self, info: CloseInfo) {
        self.link().take();
        match self.transition(Transition::Closed) {
            Ok(_) => {
                info!(code = ?info.code, reason = %info.reason, "ws: closed");
                self.emit_close(&info);
            }
            Err(e) => debug!(error = %e, "ws: close transition rejected"),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

impl WebSocketClient {
    fn emit_open(&self) {
        let handlers = self.handlers().open.clone();
        for handler in handlers {
            handler();
        }
    }

    fn emit_close(&self, info: &CloseInfo) {
        let handlers = self.handlers().close.clone();
        for handler in handlers {
            handler(info);
        }
    }

    fn emit_message(&self, payload: &Payload) {
        let handlers = self.handlers().message.clone();
        for handler in handlers {
            handler(payload);
        }
    }

    fn emit_error(&self, err: &SocketError) {
        warn!(code = err.error_code(), error = %err, "ws: error");
        let handlers = self.handlers().error.clone();
        for handler in handlers {
            handler(err);
        }
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, Handlers> {
        self.inner.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn link(&self) -> std::sync::MutexGuard<'_, Option<Arc<Link>>> {
        self.inner.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TASKS
// =============================================================================

async fn write_loop(
    client: WebSocketClient,
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            if is_closed(&e) {
                debug!("ws: write after close");
            } else {
                client.emit_error(&SocketError::Transport(Box::new(e)));
            }
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop(client: WebSocketClient, mut stream: SplitStream<WsStream>, link: Arc<Link>) {
    let mut info = CloseInfo::default();
    // Set once a local close is sent; bounds the wait for the peer's reply.
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            None => tokio::select! {
                msg = stream.next() => msg,
                () = link.close_requested.notified() => {
                    deadline = Some(Instant::now() + client.inner.config.close_timeout);
                    continue;
                }
            },
            Some(at) => match tokio::time::timeout_at(at, stream.next()).await {
                Ok(msg) => msg,
                Err(_) => {
                    warn!(timeout = ?client.inner.config.close_timeout, "ws: close handshake timed out");
                    info = CloseInfo::default();
                    break;
                }
            },
        };
        let Some(msg) = next else {
            break;
        };

        match msg {
            Ok(Message::Text(text)) => client.emit_message(&Payload::Text(text.as_str().to_owned())),
            Ok(Message::Binary(bytes)) => client.emit_message(&Payload::Binary(bytes.to_vec())),
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    info = CloseInfo { code: Some(u16::from(frame.code)), reason: frame.reason.as_str().to_owned() };
                }
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) if is_closed(&e) => break,
            Err(e) => {
                client.emit_error(&SocketError::Transport(Box::new(e)));
                break;
            }
        }
    }

    client.finish(info);
}

fn is_closed(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
