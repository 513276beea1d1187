//! Event Dispatcher
//!
//! Runs on the control thread once per tick. Pops every queued event
//! without blocking, applies each to [`SessionState`] in arrival order, and
//! hands the resulting [`Refresh`] instructions to the presentation layer
//! through the [`Surface`] trait.
//!
//! Applying an event is a plain function of the event and the current
//! state; the dispatcher never waits on the network and never re-processes
//! an event, however many times it is invoked.

use tracing::{debug, trace};

use crate::board::Position;
use crate::protocol::{decode, ServerLine, Symbol};
use crate::queue::{Event, EventReceiver, PopError};
use crate::state::SessionState;

/// One visual update for the presentation layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// Replace the status line
    StatusChanged(String),
    /// Draw a mark
    CellChanged {
        /// Which cell
        position: Position,
        /// Which mark
        symbol: Symbol,
    },
    /// Enable or disable input on a cell
    CellInteractivityChanged {
        /// Which cell
        position: Position,
        /// Whether it accepts input
        enabled: bool,
    },
    /// Show an opaque line (messenger view)
    LineReceived(String),
}

impl Refresh {
    /// Forward this instruction to `surface`
    pub fn deliver<S: Surface + ?Sized>(&self, surface: &mut S) {
        match self {
            Self::StatusChanged(text) => surface.on_status_changed(text),
            Self::CellChanged { position, symbol } => {
                surface.on_cell_changed(position.row(), position.col(), *symbol);
            }
            Self::CellInteractivityChanged { position, enabled } => {
                surface.on_cell_interactivity_changed(position.row(), position.col(), *enabled);
            }
            Self::LineReceived(text) => surface.on_line_received(text),
        }
    }
}

/// The presentation collaborator
///
/// Implemented by whatever draws the game: a terminal renderer, a GUI
/// adapter, or a recorder in tests. All calls happen on the control thread.
pub trait Surface {
    /// The status line changed
    fn on_status_changed(&mut self, text: &str);

    /// A mark appeared at `(row, col)`
    fn on_cell_changed(&mut self, row: usize, col: usize, symbol: Symbol);

    /// Input on `(row, col)` was enabled or disabled
    fn on_cell_interactivity_changed(&mut self, row: usize, col: usize, enabled: bool);

    /// An opaque line should be shown
    fn on_line_received(&mut self, text: &str);
}

/// Records instructions instead of drawing them
impl Surface for Vec<Refresh> {
    fn on_status_changed(&mut self, text: &str) {
        self.push(Refresh::StatusChanged(text.to_string()));
    }

    fn on_cell_changed(&mut self, row: usize, col: usize, symbol: Symbol) {
        if let Some(position) = Position::new(row, col) {
            self.push(Refresh::CellChanged { position, symbol });
        }
    }

    fn on_cell_interactivity_changed(&mut self, row: usize, col: usize, enabled: bool) {
        if let Some(position) = Position::new(row, col) {
            self.push(Refresh::CellInteractivityChanged { position, enabled });
        }
    }

    fn on_line_received(&mut self, text: &str) {
        self.push(Refresh::LineReceived(text.to_string()));
    }
}

/// Outcome of one dispatcher tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainResult {
    /// Events applied this tick (diagnostics only)
    pub processed: usize,
    /// Every producer is gone; no further events can arrive
    pub disconnected: bool,
}

/// Apply one event to `state`
pub fn apply(state: &mut SessionState, event: &Event) -> Vec<Refresh> {
    if state.is_closed() {
        trace!(?event, "Session closed; dropping event");
        return Vec::new();
    }

    match event {
        Event::Connected => state.mark_ready(),
        Event::MessageReceived(text) => apply_line(state, text),
        Event::Closed => state.close(),
    }
}

fn apply_line(state: &mut SessionState, text: &str) -> Vec<Refresh> {
    let decoded = match decode(text) {
        Ok(decoded) => decoded,
        Err(e) => {
            // not a valid marker, but still somebody's text
            debug!(error = %e, line = %text, "Malformed marker; showing as chat");
            return vec![Refresh::LineReceived(text.to_string())];
        }
    };

    match decoded.kind {
        ServerLine::GameStart => state.start_game(),
        ServerLine::SymbolAssigned(symbol) => state.assign_symbol(symbol),
        ServerLine::Turn(symbol) => state.set_turn(symbol),
        ServerLine::Move { position, symbol } => state.apply_remote_move(position, symbol),
        ServerLine::InvalidMove => state.invalid_move(),
        ServerLine::PeerConnected => {
            let mut refreshes = state.note_peer(decoded.line.sender.as_deref());
            refreshes.push(Refresh::LineReceived(text.to_string()));
            refreshes
        }
        ServerLine::Chat => vec![Refresh::LineReceived(text.to_string())],
    }
}

/// Drain every queued event without blocking
pub fn drain_once<S: Surface + ?Sized>(
    queue: &mut EventReceiver,
    state: &mut SessionState,
    surface: &mut S,
) -> DrainResult {
    let mut result = DrainResult::default();

    loop {
        let event = match queue.try_pop() {
            Ok(event) => event,
            Err(PopError::Empty) => break,
            Err(PopError::Disconnected) => {
                result.disconnected = true;
                break;
            }
        };

        debug!(?event, "Processing event");
        for refresh in apply(state, &event) {
            refresh.deliver(surface);
        }
        result.processed += 1;
    }

    if result.processed > 0 {
        trace!(processed = result.processed, "Dispatcher tick");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::queue::event_queue;
    use crate::state::Phase;
    use pretty_assertions::assert_eq;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col).unwrap()
    }

    #[test]
    fn test_opponent_move_applied_exactly_once() {
        let (tx, mut rx) = event_queue();
        let mut state = SessionState::new("room1", "me");
        let mut surface: Vec<Refresh> = Vec::new();

        tx.push(Event::Connected);
        tx.push(Event::MessageReceived("[room1] Server: You are assigned X".into()));
        tx.push(Event::MessageReceived("[room1] me: MOVE 0 0 X".into()));
        drain_once(&mut rx, &mut state, &mut surface);
        assert_eq!(state.turn(), Symbol::O);

        tx.push(Event::MessageReceived("[room1] userA: MOVE 1 2 O".into()));
        let first = drain_once(&mut rx, &mut state, &mut surface);
        assert_eq!(first.processed, 1);
        assert_eq!(state.board().get(pos(1, 2)), Cell::Remote);
        assert_eq!(state.turn(), Symbol::X);

        let cell_updates = |s: &Vec<Refresh>| {
            s.iter()
                .filter(|r| matches!(r, Refresh::CellChanged { position, .. } if *position == pos(1, 2)))
                .count()
        };
        assert_eq!(cell_updates(&surface), 1);

        for _ in 0..5 {
            let again = drain_once(&mut rx, &mut state, &mut surface);
            assert_eq!(again.processed, 0);
        }
        assert_eq!(cell_updates(&surface), 1);
        assert_eq!(state.turn(), Symbol::X);
    }

    #[test]
    fn test_symbol_assignment_enables_empty_cells() {
        let mut state = SessionState::new("room1", "me");
        let refreshes = apply(
            &mut state,
            &Event::MessageReceived("[room1] Server: You are assigned X".into()),
        );

        assert_eq!(state.symbol(), Some(Symbol::X));
        for position in Position::all() {
            assert!(refreshes.contains(&Refresh::CellInteractivityChanged {
                position,
                enabled: true,
            }));
            assert!(state.is_interactive(position));
        }
    }

    #[test]
    fn test_end_to_end_ordering() {
        let (tx, mut rx) = event_queue();
        let producer = std::thread::spawn(move || {
            tx.push(Event::Connected);
            tx.push(Event::MessageReceived("Game starts!".into()));
            tx.push(Event::MessageReceived("MOVE 0 0 X".into()));
        });
        producer.join().unwrap();

        let mut state = SessionState::new("room1", "me");
        let mut surface: Vec<Refresh> = Vec::new();
        let result = drain_once(&mut rx, &mut state, &mut surface);

        assert_eq!(result.processed, 3);
        assert!(result.disconnected);
        assert!(state.is_ready());

        let game_start = surface
            .iter()
            .position(|r| r == &Refresh::StatusChanged("Game started! Waiting for moves.".into()))
            .unwrap();
        let ready = surface
            .iter()
            .position(|r| matches!(r, Refresh::StatusChanged(s) if s.starts_with("Connected")))
            .unwrap();
        let cell = surface
            .iter()
            .position(|r| {
                r == &Refresh::CellChanged {
                    position: pos(0, 0),
                    symbol: Symbol::X,
                }
            })
            .unwrap();
        assert!(ready < game_start);
        assert!(game_start < cell);

        assert!(surface[cell..].contains(&Refresh::CellInteractivityChanged {
            position: pos(0, 0),
            enabled: false,
        }));
        assert!(!state.is_interactive(pos(0, 0)));
    }

    #[test]
    fn test_unmatched_and_malformed_lines() {
        let mut state = SessionState::new("room1", "me");
        state.mark_ready();
        let before = state.clone();

        let chat = apply(&mut state, &Event::MessageReceived("[room1] bob: hi all".into()));
        assert_eq!(chat, vec![Refresh::LineReceived("[room1] bob: hi all".into())]);

        let malformed = apply(&mut state, &Event::MessageReceived("[room1] bob: MOVE 9 9 X".into()));
        assert_eq!(malformed, vec![Refresh::LineReceived("[room1] bob: MOVE 9 9 X".into())]);

        assert_eq!(state.board(), before.board());
        assert_eq!(state.turn(), before.turn());
        assert_eq!(state.status(), before.status());
    }

    #[test]
    fn test_chat_starting_with_marker_words_is_shown() {
        let mut state = SessionState::new("room1", "me");
        state.mark_ready();
        let before = state.clone();

        for line in [
            "[room1] bob: Turn left at the light",
            "[room1] bob: MOVE over please",
            "[room1] bob: You are assigned homework",
        ] {
            let refreshes = apply(&mut state, &Event::MessageReceived(line.into()));
            assert_eq!(refreshes, vec![Refresh::LineReceived(line.into())]);
        }

        assert_eq!(state.symbol(), None);
        assert_eq!(state.turn(), before.turn());
        assert_eq!(state.board(), before.board());
    }

    #[test]
    fn test_opponent_turn_disables_every_empty_cell() {
        let mut state = SessionState::new("room1", "me");
        apply(&mut state, &Event::Connected);
        apply(
            &mut state,
            &Event::MessageReceived("[room1] Server: You are assigned X".into()),
        );

        let refreshes = apply(&mut state, &Event::MessageReceived("[room1] Server: Turn O".into()));
        for position in Position::all() {
            assert!(refreshes.contains(&Refresh::CellInteractivityChanged {
                position,
                enabled: false,
            }));
            assert!(!state.is_interactive(position));
        }
        assert!(!refreshes.iter().any(|r| matches!(
            r,
            Refresh::CellInteractivityChanged { enabled: true, .. }
        )));
    }

    #[test]
    fn test_occupied_cells_never_reenabled() {
        let (tx, mut rx) = event_queue();
        let mut state = SessionState::new("room1", "me");
        let mut surface: Vec<Refresh> = Vec::new();

        tx.push(Event::Connected);
        tx.push(Event::MessageReceived("[room1] Server: You are assigned X".into()));
        tx.push(Event::MessageReceived("[room1] me: MOVE 0 0 X".into()));
        tx.push(Event::MessageReceived("[room1] bob: MOVE 1 1 O".into()));
        tx.push(Event::MessageReceived("[room1] Server: Turn X".into()));
        drain_once(&mut rx, &mut state, &mut surface);

        // last instruction per occupied cell must be "disabled"
        for occupied in [pos(0, 0), pos(1, 1)] {
            let last = surface.iter().rev().find_map(|r| match r {
                Refresh::CellInteractivityChanged { position, enabled } if *position == occupied => {
                    Some(*enabled)
                }
                _ => None,
            });
            assert_eq!(last, Some(false));

            let reenabled = surface.iter().skip_while(|r| {
                !matches!(r, Refresh::CellChanged { position, .. } if *position == occupied)
            });
            for refresh in reenabled {
                assert_ne!(
                    refresh,
                    &Refresh::CellInteractivityChanged {
                        position: occupied,
                        enabled: true,
                    }
                );
            }
        }
        assert!(state.is_interactive(pos(2, 2)));
    }

    #[test]
    fn test_invalid_move_marker_sets_status() {
        let mut state = SessionState::new("room1", "me");
        let refreshes = apply(&mut state, &Event::MessageReceived("[room1] Server: Invalid move!".into()));
        assert_eq!(refreshes, vec![Refresh::StatusChanged("Invalid move!".into())]);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = SessionState::new("room1", "me");
        apply(&mut state, &Event::Connected);
        apply(&mut state, &Event::Closed);
        assert_eq!(state.phase(), Phase::Closed);

        let late = apply(&mut state, &Event::MessageReceived("Game starts!".into()));
        assert!(late.is_empty());
        assert_eq!(state.phase(), Phase::Closed);
        assert_eq!(state.status(), "Connection closed.");
    }

    #[test]
    fn test_refresh_delivery() {
        let mut surface: Vec<Refresh> = Vec::new();
        let refresh = Refresh::CellChanged {
            position: pos(2, 1),
            symbol: Symbol::O,
        };
        refresh.deliver(&mut surface);
        assert_eq!(surface, vec![refresh]);
    }
}
