//! Line Protocol
//!
//! Every frame on the wire is one tagged text line:
//!
//! ```text
//! [<room_id>] <user_id>: <payload>
//! ```
//!
//! The payload is matched against a small ordered set of markers (first
//! match wins). Anything that matches no marker is an opaque chat line.
//! A payload that starts like a marker but carries bad arguments is a
//! [`MalformedMessage`]; callers log it and show the raw line as chat.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::board::Position;

/// Payload the server sends when both seats are filled
pub const GAME_START_MARKER: &str = "Game starts!";
/// Payload the server sends when it rejects a move
pub const INVALID_MOVE_MARKER: &str = "Invalid move!";
/// Greeting payload every client sends on connect
pub const CONNECTED_MARKER: &str = "CONNECTED";

const ASSIGNED_PREFIX: &str = "You are assigned ";
const TURN_PREFIX: &str = "Turn ";
const MOVE_PREFIX: &str = "MOVE ";

/// A player's mark
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Moves first
    X,
    /// Moves second
    O,
}

impl Symbol {
    /// The other player's symbol
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// The wire character for this symbol
    pub fn as_char(self) -> char {
        match self {
            Self::X => 'X',
            Self::O => 'O',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Symbol {
    type Err = MalformedMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::X),
            "O" => Ok(Self::O),
            other => Err(MalformedMessage::BadSymbol(other.to_string())),
        }
    }
}

/// An inbound payload that looked like a marker but could not be decoded
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    /// Symbol was not `X` or `O`
    #[error("unknown symbol {0:?}")]
    BadSymbol(String),

    /// `MOVE` arguments missing, non-numeric, or off the board
    #[error("bad move arguments {0:?}")]
    BadMove(String),
}

/// One line split into its tag and payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedLine {
    /// Room the line was posted to, if tagged
    pub room: Option<String>,
    /// Sender id, if tagged
    pub sender: Option<String>,
    /// Everything after the tag (or the whole line when untagged)
    pub payload: String,
}

impl TaggedLine {
    /// Split `"[room] user: payload"`.
    ///
    /// Lines without a well-formed tag are kept whole as an untagged payload.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_end_matches(['\r', '\n']);

        let tagged = text
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .and_then(|(room, rest)| {
                rest.split_once(": ")
                    .map(|(sender, payload)| (room, sender, payload))
            });

        match tagged {
            Some((room, sender, payload)) if !sender.is_empty() => Self {
                room: Some(room.to_string()),
                sender: Some(sender.to_string()),
                payload: payload.to_string(),
            },
            _ => Self {
                room: None,
                sender: None,
                payload: text.to_string(),
            },
        }
    }

    /// Whether this line was sent under the given user id
    pub fn is_from(&self, user: &str) -> bool {
        self.sender.as_deref() == Some(user)
    }
}

/// Format an outbound line in the tagged wire form
pub fn format_tagged(room: &str, user: &str, text: &str) -> String {
    format!("[{room}] {user}: {text}")
}

/// Cut `text` to at most `max` bytes without splitting a UTF-8 character.
///
/// Returns the number of bytes dropped.
pub fn truncate_to_frame(text: &mut String, max: usize) -> usize {
    if text.len() <= max {
        return 0;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let dropped = text.len() - cut;
    text.truncate(cut);
    dropped
}

/// A decoded payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerLine {
    /// Both players are present
    GameStart,
    /// This client plays `Symbol`
    SymbolAssigned(Symbol),
    /// It is now `Symbol`'s turn
    Turn(Symbol),
    /// A mark was placed
    Move {
        /// Target cell
        position: Position,
        /// Whose mark
        symbol: Symbol,
    },
    /// The server refused the last move
    InvalidMove,
    /// Some client sent its greeting
    PeerConnected,
    /// Anything else
    Chat,
}

impl ServerLine {
    /// Classify a payload. First match wins.
    pub fn classify(payload: &str) -> Result<Self, MalformedMessage> {
        let payload = payload.trim();

        if payload.contains(GAME_START_MARKER) {
            return Ok(Self::GameStart);
        }
        if let Some(rest) = payload.strip_prefix(ASSIGNED_PREFIX) {
            return rest.trim().parse().map(Self::SymbolAssigned);
        }
        if let Some(rest) = payload.strip_prefix(TURN_PREFIX) {
            return rest.trim().parse().map(Self::Turn);
        }
        if let Some(rest) = payload.strip_prefix(MOVE_PREFIX) {
            return parse_move(rest);
        }
        if payload.contains(INVALID_MOVE_MARKER) {
            return Ok(Self::InvalidMove);
        }
        if payload == CONNECTED_MARKER {
            return Ok(Self::PeerConnected);
        }
        Ok(Self::Chat)
    }
}

fn parse_move(args: &str) -> Result<ServerLine, MalformedMessage> {
    let bad = || MalformedMessage::BadMove(args.to_string());

    let mut parts = args.split_whitespace();
    let (Some(row), Some(col), Some(symbol), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };

    let row: usize = row.parse().map_err(|_| bad())?;
    let col: usize = col.parse().map_err(|_| bad())?;
    let position = Position::new(row, col).ok_or_else(bad)?;
    let symbol = symbol.parse()?;

    Ok(ServerLine::Move { position, symbol })
}

/// A line after tag splitting and payload classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// The tag and raw payload
    pub line: TaggedLine,
    /// What the payload means
    pub kind: ServerLine,
}

/// Split and classify one inbound line
pub fn decode(text: &str) -> Result<Decoded, MalformedMessage> {
    let line = TaggedLine::parse(text);
    let kind = ServerLine::classify(&line.payload)?;
    Ok(Decoded { line, kind })
}

/// The payload for a local move
pub fn move_command(position: Position, symbol: Symbol) -> String {
    format!("MOVE {} {} {}", position.row(), position.col(), symbol)
}
