//! Session Core - Headless Network Session for the Tic-Tac-Toe Client
//!
//! This crate owns everything between the socket and the screen, and
//! nothing on the screen itself. A presentation layer (terminal, GUI,
//! test harness) drives it through [`Session`] and receives refresh
//! instructions through the [`Surface`] trait.
//!
//! # Architecture
//!
//! ```text
//!   worker thread                          control thread
//! ┌──────────────────────┐             ┌──────────────────────────┐
//! │  ServiceLoop         │   Event     │  drain_once (every tick) │
//! │  (tokio-tungstenite) │ ──────────► │  SessionState + Surface  │
//! │                      │  EventQueue │                          │
//! │                      │ ◄────────── │  ConnectionHandle::send  │
//! └──────────────────────┘  outbound   └──────────────────────────┘
//! ```
//!
//! - [`transport`]: connect, the blocking service loop, outbound writes
//! - [`queue`]: the thread-safe FIFO of decoded [`Event`]s
//! - [`protocol`]: tagged-line wire format and payload decoder
//! - [`board`] / [`state`]: the 3x3 grid and the rest of the session state
//! - [`dispatcher`]: applies queued events to state, emits [`Refresh`]es
//! - [`session`]: the facade the presentation layer calls into
//! - [`config`]: layered configuration (defaults, TOML file, env)
//!
//! # No UI Dependencies
//!
//! Nothing here prints, reads stdin, or knows about widgets.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod board;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod state;
pub mod transport;

pub use board::{Board, Cell, Position, BOARD_SIZE};
pub use config::{
    default_config_path, load_config, ConfigError, ConfigOverrides, ConfigSource, Endpoint,
    SessionConfig,
};
pub use dispatcher::{apply, drain_once, DrainResult, Refresh, Surface};
pub use protocol::{Decoded, MalformedMessage, ServerLine, Symbol, TaggedLine};
pub use queue::{event_queue, Event, EventReceiver, EventSender, PopError};
pub use session::Session;
pub use state::{InvalidMoveRejected, Phase, SessionState};
pub use transport::{
    connect, ConnectionError, ConnectionHandle, Identity, SendOutcome, ServiceLoop, StopFlag,
};
