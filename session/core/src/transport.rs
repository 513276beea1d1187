//! Session Transport
//!
//! Owns the single WebSocket connection. [`connect`] performs the
//! handshake and returns two halves:
//!
//! - [`ConnectionHandle`]: cheap, cloneable, used from the control thread
//!   to write tagged lines and to request shutdown
//! - [`ServiceLoop`]: moved onto a dedicated worker thread, where
//!   [`ServiceLoop::run`] services the socket until the stop flag is set or
//!   the server goes away
//!
//! The service loop never touches session state. It only turns lifecycle
//! callbacks (established, data, closed) into [`Event`]s on the queue.
//!
//! # Policies
//!
//! - Outbound lines longer than `max_frame_size` are silently truncated at
//!   a character boundary ([`SendOutcome::Truncated`]).
//! - Writes after shutdown or close are dropped ([`SendOutcome::Discarded`]).
//! - There is no reconnection. A closed session stays closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::protocol::{format_tagged, truncate_to_frame};
use crate::queue::{Event, EventSender};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Startup failures. All of them are fatal; nothing is retried.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The endpoint does not form a usable WebSocket URL
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// URL that was attempted
        url: String,
        /// What was wrong with it
        reason: String,
    },

    /// The worker runtime or thread could not be created
    #[error("Failed to start transport: {0}")]
    Runtime(#[source] std::io::Error),

    /// TCP connect or WebSocket upgrade failed
    #[error("WebSocket handshake with {url} failed: {source}")]
    Handshake {
        /// URL that was attempted
        url: String,
        /// Underlying protocol or IO error
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// The handshake did not finish in time
    #[error("WebSocket handshake with {url} timed out after {timeout:?}")]
    Timeout {
        /// URL that was attempted
        url: String,
        /// The configured bound
        timeout: Duration,
    },

    /// This process already used its one connection
    #[error("A session connection already exists")]
    AlreadyConnected,
}

/// Who we are on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Room id used in every tag
    pub room: String,
    /// User id used in every tag
    pub user: String,
}

impl Identity {
    /// Build an identity
    pub fn new(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            user: user.into(),
        }
    }

    /// Tag `text` and cut it to `max_frame_size` bytes.
    ///
    /// Returns the line and the number of bytes dropped.
    pub fn frame(&self, text: &str, max_frame_size: usize) -> (String, usize) {
        let mut line = format_tagged(&self.room, &self.user, text);
        let dropped = truncate_to_frame(&mut line, max_frame_size);
        (line, dropped)
    }
}

/// Shared cancellation flag, settable from either thread
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// A cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` if it was already set.
    pub fn set(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Whether the flag is set
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to an outbound line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for the worker as-is
    Sent,
    /// Queued after cutting `dropped` bytes off the end
    Truncated {
        /// Bytes removed
        dropped: usize,
    },
    /// The session is closed or shutting down; nothing was queued
    Discarded,
}

/// Control-thread side of the connection
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    identity: Arc<Identity>,
    outbound: mpsc::UnboundedSender<String>,
    stop: StopFlag,
    open: Arc<AtomicBool>,
    max_frame_size: usize,
}

impl ConnectionHandle {
    /// Tag, truncate and queue one text frame. Never blocks.
    pub fn send(&self, text: &str) -> SendOutcome {
        if self.stop.is_set() || !self.is_open() {
            debug!(text = %text, "Session closed; discarding outbound message");
            return SendOutcome::Discarded;
        }

        let (line, dropped) = self.identity.frame(text, self.max_frame_size);
        debug!(line = %line, "Sending message");

        if self.outbound.send(line).is_err() {
            return SendOutcome::Discarded;
        }
        if dropped > 0 {
            debug!(dropped, max = self.max_frame_size, "Outbound message truncated");
            SendOutcome::Truncated { dropped }
        } else {
            SendOutcome::Sent
        }
    }

    /// Ask the worker to close gracefully. Idempotent.
    pub fn shutdown(&self) {
        if self.stop.set() {
            debug!("Shutdown already requested");
        } else {
            info!("Shutdown requested");
        }
    }

    /// Whether the socket is still up
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Worker-thread side of the connection
pub struct ServiceLoop {
    runtime: Runtime,
    socket: Socket,
    outbound: mpsc::UnboundedReceiver<String>,
    events: EventSender,
    stop: StopFlag,
    open: Arc<AtomicBool>,
    identity: Arc<Identity>,
    greeting: Option<String>,
    service_timeout: Duration,
    max_frame_size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseReason {
    Local,
    Remote,
    Error,
}

/// Open the connection.
///
/// Blocks the calling thread for at most `connect_timeout_ms`. Must not be
/// called from inside an async runtime.
pub fn connect(
    config: &SessionConfig,
    identity: Identity,
    events: EventSender,
) -> Result<(ConnectionHandle, ServiceLoop), ConnectionError> {
    let url = config.endpoint.url();
    let timeout = config.connect_timeout();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ConnectionError::Runtime)?;

    info!(url = %url, room = %identity.room, user = %identity.user, "Connecting");

    let handshake = runtime.block_on(async {
        tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await
    });

    let socket = match handshake {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_)))) => {
            return Err(ConnectionError::InvalidEndpoint {
                url,
                reason: e.to_string(),
            });
        }
        Ok(Err(source)) => {
            return Err(ConnectionError::Handshake {
                url,
                source: Box::new(source),
            });
        }
        Err(_elapsed) => return Err(ConnectionError::Timeout { url, timeout }),
    };

    info!(url = %url, "WebSocket connected");

    let identity = Arc::new(identity);
    let stop = StopFlag::new();
    let open = Arc::new(AtomicBool::new(true));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let handle = ConnectionHandle {
        identity: Arc::clone(&identity),
        outbound: outbound_tx,
        stop: stop.clone(),
        open: Arc::clone(&open),
        max_frame_size: config.max_frame_size,
    };

    let service = ServiceLoop {
        runtime,
        socket,
        outbound: outbound_rx,
        events,
        stop,
        open,
        identity,
        greeting: config.greeting.clone(),
        service_timeout: config.service_timeout(),
        max_frame_size: config.max_frame_size,
    };

    Ok((handle, service))
}

impl ServiceLoop {
    /// Service the socket until stopped or closed. Call on the worker thread.
    ///
    /// Pushes `Connected` first and `Closed` last, exactly once each.
    pub fn run(self) {
        let Self {
            runtime,
            socket,
            outbound,
            events,
            stop,
            open,
            identity,
            greeting,
            service_timeout,
            max_frame_size,
        } = self;

        let worker = Worker {
            events,
            stop,
            identity,
            service_timeout,
            max_frame_size,
        };
        let reason = runtime.block_on(worker.service(socket, outbound, greeting));

        open.store(false, Ordering::SeqCst);
        worker.stop.set();
        worker.events.push(Event::Closed);
        info!(reason = ?reason, "Session transport stopped");
    }
}

struct Worker {
    events: EventSender,
    stop: StopFlag,
    identity: Arc<Identity>,
    service_timeout: Duration,
    max_frame_size: usize,
}

impl Worker {
    async fn service(
        &self,
        mut socket: Socket,
        mut outbound: mpsc::UnboundedReceiver<String>,
        greeting: Option<String>,
    ) -> CloseReason {
        self.events.push(Event::Connected);

        if let Some(greeting) = greeting {
            let (line, _) = self.identity.frame(&greeting, self.max_frame_size);
            debug!(line = %line, "Sending greeting");
            if !self.write(&mut socket, line).await {
                return CloseReason::Error;
            }
        }

        let reason = loop {
            if self.stop.is_set() {
                break CloseReason::Local;
            }

            tokio::select! {
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!(message = %text, "Received message");
                        self.events.push(Event::MessageReceived(text));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        debug!(message = %text, "Received binary message");
                        self.events.push(Event::MessageReceived(text));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "Server closed the connection");
                        break CloseReason::Remote;
                    }
                    // ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Transport error");
                        break CloseReason::Error;
                    }
                    None => break CloseReason::Remote,
                },
                Some(line) = outbound.recv() => {
                    if !self.write(&mut socket, line).await {
                        break CloseReason::Error;
                    }
                }
                () = tokio::time::sleep(self.service_timeout) => {}
            }
        };

        if reason != CloseReason::Error {
            self.close_gracefully(&mut socket, &mut outbound, reason).await;
        }
        reason
    }

    /// Write one text frame, bounded by one service timeout
    async fn write(&self, socket: &mut Socket, line: String) -> bool {
        match tokio::time::timeout(self.service_timeout, socket.send(Message::Text(line))).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Write error");
                false
            }
            Err(_) => {
                warn!(timeout = ?self.service_timeout, "Write timed out");
                false
            }
        }
    }

    /// Flush what the control thread queued before shutdown, then send a
    /// close frame. Bounded by one service timeout.
    async fn close_gracefully(
        &self,
        socket: &mut Socket,
        outbound: &mut mpsc::UnboundedReceiver<String>,
        reason: CloseReason,
    ) {
        let close = async {
            if reason == CloseReason::Local {
                while let Ok(line) = outbound.try_recv() {
                    socket.send(Message::Text(line)).await?;
                }
            }
            socket.close(None).await
        };

        match tokio::time::timeout(self.service_timeout, close).await {
            Ok(Ok(())) => debug!("Close handshake sent"),
            Ok(Err(e)) => debug!(error = %e, "Close after disconnect"),
            Err(_) => debug!("Close handshake timed out"),
        }
    }
}
