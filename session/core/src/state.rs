//! Session State
//!
//! Everything the control thread knows about the current game: who we
//! are, which symbol we play, whose turn it is, and the board. Only the
//! control thread touches this (after dispatch, or from presentation input
//! handlers), so it carries no locks.
//!
//! # Phases
//!
//! ```text
//! AwaitingConnection ─► AwaitingOpponent ─► LocalTurn ⇄ RemoteTurn
//!          │                   │                 │          │
//!          └───────────────────┴────► Closed ◄───┴──────────┘
//! ```
//!
//! The phase is derived from the fields rather than stored, so it can never
//! disagree with them.

use thiserror::Error;

use crate::board::{Board, Cell, Position};
use crate::dispatcher::Refresh;
use crate::protocol::Symbol;

/// Players needed before anyone may move
pub const REQUIRED_PLAYERS: u8 = 2;

const WAITING_STATUS: &str = "Waiting for second player...";
const GAME_STARTED_STATUS: &str = "Game started! Waiting for moves.";
const CLOSED_STATUS: &str = "Connection closed.";

/// Why a local move was refused. The board is untouched in every case.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidMoveRejected {
    /// Coordinates outside the 3x3 grid
    #[error("({row}, {col}) is off the board")]
    OutOfRange {
        /// Requested row
        row: usize,
        /// Requested column
        col: usize,
    },

    /// Cell already holds a mark
    #[error("cell ({row}, {col}) is already taken")]
    Occupied {
        /// Row of the taken cell
        row: usize,
        /// Column of the taken cell
        col: usize,
    },

    /// The turn marker points at the opponent
    #[error("it is {turn}'s turn")]
    NotYourTurn {
        /// Whose turn it is
        turn: Symbol,
    },

    /// The server has not assigned us a symbol
    #[error("no symbol assigned yet")]
    NoSymbol,

    /// The connection is gone
    #[error("the session is closed")]
    SessionClosed,
}

/// Where the session is in its lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Handshake not yet reported
    AwaitingConnection,
    /// Connected, but no game in progress for us yet
    AwaitingOpponent,
    /// We may move
    LocalTurn,
    /// The opponent may move
    RemoteTurn,
    /// Terminal
    Closed,
}

/// Control-thread game state
#[derive(Clone, Debug)]
pub struct SessionState {
    room: String,
    user: String,
    symbol: Option<Symbol>,
    turn: Symbol,
    board: Board,
    players_connected: u8,
    ready: bool,
    closed: bool,
    status: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl SessionState {
    /// Fresh state for `user` in `room`. `X` moves first.
    pub fn new(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            user: user.into(),
            symbol: None,
            turn: Symbol::X,
            board: Board::new(),
            players_connected: 0,
            ready: false,
            closed: false,
            status: WAITING_STATUS.to_string(),
        }
    }

    /// Room id
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Our user id
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The symbol the server gave us
    pub fn symbol(&self) -> Option<Symbol> {
        self.symbol
    }

    /// Whose turn it is
    pub fn turn(&self) -> Symbol {
        self.turn
    }

    /// The grid
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Known players in the room, ourselves included
    pub fn players_connected(&self) -> u8 {
        self.players_connected
    }

    /// Whether the transport reported the handshake
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the session has ended
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Last status line
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Current phase, derived from the fields
    pub fn phase(&self) -> Phase {
        if self.closed {
            Phase::Closed
        } else if !self.ready {
            Phase::AwaitingConnection
        } else if self.players_connected < REQUIRED_PLAYERS || self.symbol.is_none() {
            Phase::AwaitingOpponent
        } else if Some(self.turn) == self.symbol {
            Phase::LocalTurn
        } else {
            Phase::RemoteTurn
        }
    }

    /// Whether a local move would be considered at all right now
    pub fn can_play(&self) -> bool {
        !self.closed
            && self.players_connected >= REQUIRED_PLAYERS
            && self.symbol.is_some_and(|s| s == self.turn)
    }

    /// Whether the cell at `pos` should accept input
    pub fn is_interactive(&self, pos: Position) -> bool {
        self.can_play() && self.board.get(pos).is_empty()
    }

    /// Re-derive the affordance of every still-empty cell.
    ///
    /// Occupied cells are never re-enabled, so they are skipped.
    pub fn interactivity_refreshes(&self) -> Vec<Refresh> {
        let enabled = self.can_play();
        self.board
            .empty_cells()
            .map(|position| Refresh::CellInteractivityChanged { position, enabled })
            .collect()
    }

    fn set_status(&mut self, text: impl Into<String>) -> Refresh {
        self.status = text.into();
        Refresh::StatusChanged(self.status.clone())
    }

    fn turn_status(&self) -> String {
        match self.symbol {
            Some(symbol) if symbol == self.turn => format!("Your turn ({symbol})"),
            Some(symbol) => format!("Waiting for {} (you are {symbol})", self.turn),
            None => format!("Turn {}", self.turn),
        }
    }

    /// Transport is up; we count ourselves
    pub fn mark_ready(&mut self) -> Vec<Refresh> {
        self.ready = true;
        self.players_connected = self.players_connected.max(1);
        vec![self.set_status(format!("Connected to room {}. {WAITING_STATUS}", self.room))]
    }

    /// Both seats are filled
    pub fn start_game(&mut self) -> Vec<Refresh> {
        self.players_connected = REQUIRED_PLAYERS;
        let mut refreshes = vec![self.set_status(GAME_STARTED_STATUS)];
        refreshes.extend(self.interactivity_refreshes());
        refreshes
    }

    /// Another client greeted the room
    pub fn note_peer(&mut self, sender: Option<&str>) -> Vec<Refresh> {
        match sender {
            Some(peer) if peer != self.user => {
                self.players_connected = self.players_connected.max(REQUIRED_PLAYERS);
                vec![self.set_status(format!("{peer} joined"))]
            }
            _ => Vec::new(),
        }
    }

    /// The server told us our symbol. Assignment implies an opponent.
    pub fn assign_symbol(&mut self, symbol: Symbol) -> Vec<Refresh> {
        self.symbol = Some(symbol);
        self.players_connected = REQUIRED_PLAYERS;
        let status = format!("You are {symbol}. {}", self.turn_status());
        let mut refreshes = vec![self.set_status(status)];
        refreshes.extend(self.interactivity_refreshes());
        refreshes
    }

    /// The server announced whose turn it is
    pub fn set_turn(&mut self, turn: Symbol) -> Vec<Refresh> {
        self.turn = turn;
        let status = self.turn_status();
        let mut refreshes = vec![self.set_status(status)];
        refreshes.extend(self.interactivity_refreshes());
        refreshes
    }

    /// The server refused a move
    pub fn invalid_move(&mut self) -> Vec<Refresh> {
        vec![self.set_status(crate::protocol::INVALID_MOVE_MARKER)]
    }

    /// A mark arrived over the wire.
    ///
    /// Moves onto occupied cells are dropped and leave the turn alone.
    pub fn apply_remote_move(&mut self, position: Position, symbol: Symbol) -> Vec<Refresh> {
        let cell = if Some(symbol) == self.symbol {
            Cell::Local
        } else {
            Cell::Remote
        };

        if !self.board.place(position, cell) {
            tracing::debug!(
                row = position.row(),
                col = position.col(),
                %symbol,
                "Ignoring move onto occupied cell"
            );
            return Vec::new();
        }

        self.turn = symbol.opponent();
        self.placed(position, symbol)
    }

    /// Validate and apply a move from the presentation layer.
    ///
    /// On success returns the refreshes and the symbol that was played.
    pub fn try_local_move(
        &mut self,
        position: Position,
    ) -> Result<(Vec<Refresh>, Symbol), InvalidMoveRejected> {
        if self.closed {
            return Err(InvalidMoveRejected::SessionClosed);
        }
        // assignment always brings the player count to REQUIRED_PLAYERS
        let symbol = self.symbol.ok_or(InvalidMoveRejected::NoSymbol)?;
        if self.turn != symbol {
            return Err(InvalidMoveRejected::NotYourTurn { turn: self.turn });
        }
        if !self.board.place(position, Cell::Local) {
            return Err(InvalidMoveRejected::Occupied {
                row: position.row(),
                col: position.col(),
            });
        }

        self.turn = symbol.opponent();
        Ok((self.placed(position, symbol), symbol))
    }

    fn placed(&mut self, position: Position, symbol: Symbol) -> Vec<Refresh> {
        let mut refreshes = vec![
            Refresh::CellChanged { position, symbol },
            Refresh::CellInteractivityChanged {
                position,
                enabled: false,
            },
        ];
        refreshes.extend(self.interactivity_refreshes());
        let status = self.turn_status();
        refreshes.push(self.set_status(status));
        refreshes
    }

    /// The connection ended. Idempotent.
    pub fn close(&mut self) -> Vec<Refresh> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let mut refreshes = vec![self.set_status(CLOSED_STATUS)];
        refreshes.extend(self.interactivity_refreshes());
        refreshes
    }
}
