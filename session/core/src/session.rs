//! Session Facade
//!
//! The single entry point for a presentation layer. It owns the event
//! queue, the session state, and (once connected) the transport handle and
//! worker thread. Every method runs on the control thread.
//!
//! ```ignore
//! let mut session = Session::new(config);
//! session.request_connect("room1", "alice")?;
//! loop {
//!     session.tick(&mut surface);
//!     // feed user input: request_move / request_send
//!     std::thread::sleep(session.tick_interval());
//! }
//! ```

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::Position;
use crate::config::SessionConfig;
use crate::dispatcher::{drain_once, DrainResult, Surface};
use crate::protocol::move_command;
use crate::queue::{event_queue, EventReceiver, EventSender};
use crate::state::{InvalidMoveRejected, SessionState};
use crate::transport::{self, ConnectionError, ConnectionHandle, Identity, SendOutcome};

const WORKER_THREAD_NAME: &str = "session-transport";

/// One connection lifetime, from connect to close
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    events: EventReceiver,
    /// Producer half, handed to the transport on connect
    producer: Option<EventSender>,
    handle: Option<ConnectionHandle>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Create an unconnected session
    pub fn new(config: SessionConfig) -> Self {
        let (producer, events) = event_queue();
        Self {
            config,
            state: SessionState::default(),
            events,
            producer: Some(producer),
            handle: None,
            worker: None,
        }
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The effective configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// How often [`Session::tick`] should run
    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval()
    }

    /// Whether the transport is still up
    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(ConnectionHandle::is_open)
    }

    /// Connect as `user` in `room` and start the worker thread.
    ///
    /// A session connects at most once; a second call fails with
    /// [`ConnectionError::AlreadyConnected`].
    pub fn request_connect(
        &mut self,
        room: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        let producer = self
            .producer
            .take()
            .ok_or(ConnectionError::AlreadyConnected)?;

        let identity = Identity::new(room, user);
        self.state = SessionState::new(identity.room.clone(), identity.user.clone());

        let (handle, service) = transport::connect(&self.config, identity, producer)?;

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || service.run())
            .map_err(ConnectionError::Runtime)?;

        self.handle = Some(handle);
        self.worker = Some(worker);
        Ok(())
    }

    /// One dispatcher tick: apply everything the worker queued
    pub fn tick<S: Surface + ?Sized>(&mut self, surface: &mut S) -> DrainResult {
        drain_once(&mut self.events, &mut self.state, surface)
    }

    /// Try to play at `(row, col)`.
    ///
    /// Rejections leave state untouched and are reported to `surface` as a
    /// status line.
    pub fn request_move<S: Surface + ?Sized>(
        &mut self,
        row: usize,
        col: usize,
        surface: &mut S,
    ) -> Result<(), InvalidMoveRejected> {
        let result = Position::new(row, col)
            .ok_or(InvalidMoveRejected::OutOfRange { row, col })
            .and_then(|position| {
                self.state
                    .try_local_move(position)
                    .map(|(refreshes, symbol)| (position, refreshes, symbol))
            });

        match result {
            Ok((position, refreshes, symbol)) => {
                for refresh in &refreshes {
                    refresh.deliver(surface);
                }
                self.request_send(&move_command(position, symbol));
                Ok(())
            }
            Err(rejected) => {
                debug!(row, col, reason = %rejected, "Move rejected");
                surface.on_status_changed(&format!("Invalid move: {rejected}"));
                Err(rejected)
            }
        }
    }

    /// Send a free-form line. A no-op once the session is closed.
    pub fn request_send(&mut self, text: &str) -> SendOutcome {
        if self.state.is_closed() {
            return SendOutcome::Discarded;
        }
        match self.handle {
            Some(ref handle) => handle.send(text),
            None => {
                warn!("Send requested before connecting");
                SendOutcome::Discarded
            }
        }
    }

    /// Close gracefully, join the worker, and apply the final events.
    ///
    /// Idempotent. Returns within roughly one service timeout of the
    /// worker noticing the stop flag.
    pub fn request_shutdown<S: Surface + ?Sized>(&mut self, surface: &mut S) -> DrainResult {
        self.teardown();
        let result = self.tick(surface);
        if !self.state.is_closed() {
            // never connected, or the worker died without reporting
            for refresh in self.state.close() {
                refresh.deliver(surface);
            }
        }
        result
    }

    fn teardown(&mut self) {
        if let Some(ref handle) = self.handle {
            handle.shutdown();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Transport worker panicked");
            } else {
                info!("Transport worker joined");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
