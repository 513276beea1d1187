//! Plain-text rendering of refresh instructions
//!
//! Status and chat lines print as they arrive. Board changes are batched
//! and drawn once per tick by [`TerminalSurface::flush`].

use std::io::Write;

use session_core::{Surface, Symbol, BOARD_SIZE};
use tracing::warn;

use crate::input::Mode;

type Grid<T> = [[T; BOARD_SIZE]; BOARD_SIZE];

/// A [`Surface`] that writes to a terminal (or any writer)
pub struct TerminalSurface<W: Write> {
    out: W,
    mode: Mode,
    marks: Grid<Option<Symbol>>,
    enabled: Grid<bool>,
    board_dirty: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, mode: Mode) -> Self {
        Self {
            out,
            mode,
            marks: Default::default(),
            enabled: Default::default(),
            board_dirty: false,
        }
    }

    /// Draw the board if it changed since the last flush
    pub fn flush(&mut self) {
        if self.mode == Mode::Game && self.board_dirty {
            let board = self.render_board();
            self.write(&board);
            self.board_dirty = false;
        }
        if let Err(e) = self.out.flush() {
            warn!(error = %e, "Failed to flush terminal");
        }
    }

    /// The board as text. Playable empty cells show a dot.
    pub fn render_board(&self) -> String {
        let header: Vec<String> = (0..BOARD_SIZE).map(|col| format!(" {col} ")).collect();
        let rule = vec!["---"; BOARD_SIZE].join("+");

        let mut text = format!("   {}\n", header.join(" "));
        for row in 0..BOARD_SIZE {
            let cells: Vec<String> = (0..BOARD_SIZE)
                .map(|col| format!(" {} ", self.mark(row, col)))
                .collect();
            text.push_str(&format!("{row}  {}\n", cells.join("|")));
            if row + 1 < BOARD_SIZE {
                text.push_str(&format!("   {rule}\n"));
            }
        }
        text
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn mark(&self, row: usize, col: usize) -> char {
        match self.marks[row][col] {
            Some(symbol) => symbol.as_char(),
            None if self.enabled[row][col] => '.',
            None => ' ',
        }
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = write!(self.out, "{text}") {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn on_status_changed(&mut self, text: &str) {
        self.write(&format!("* {text}\n"));
    }

    fn on_cell_changed(&mut self, row: usize, col: usize, symbol: Symbol) {
        if let Some(cell) = self.marks.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = Some(symbol);
            self.board_dirty = true;
        }
    }

    fn on_cell_interactivity_changed(&mut self, row: usize, col: usize, enabled: bool) {
        if let Some(cell) = self.enabled.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = enabled;
            self.board_dirty = true;
        }
    }

    fn on_line_received(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(surface: TerminalSurface<Vec<u8>>) -> String {
        String::from_utf8(surface.into_inner()).unwrap()
    }

    #[test]
    fn test_board_rendering() {
        let mut surface = TerminalSurface::new(Vec::new(), Mode::Game);
        surface.on_cell_changed(1, 1, Symbol::X);
        surface.on_cell_changed(0, 2, Symbol::O);
        surface.on_cell_interactivity_changed(0, 0, true);

        let expected = "    0   1   2 \n\
                        0   . |   | O \n\
                        \x20  ---+---+---\n\
                        1     | X |   \n\
                        \x20  ---+---+---\n\
                        2     |   |   \n";
        assert_eq!(surface.render_board(), expected);
    }

    #[test]
    fn test_board_drawn_once_per_flush() {
        let mut surface = TerminalSurface::new(Vec::new(), Mode::Game);
        surface.on_cell_changed(2, 2, Symbol::O);
        surface.flush();
        surface.flush();

        let text = output(surface);
        assert_eq!(text.matches("---+---+---").count(), 2);
    }

    #[test]
    fn test_messenger_prints_lines_only() {
        let mut surface = TerminalSurface::new(Vec::new(), Mode::Messenger);
        surface.on_status_changed("Connected to room room1.");
        surface.on_cell_changed(0, 0, Symbol::X);
        surface.on_line_received("[room1] bob: hi");
        surface.flush();

        assert_eq!(output(surface), "* Connected to room room1.\n[room1] bob: hi\n");
    }

    #[test]
    fn test_out_of_range_cells_are_ignored() {
        let mut surface = TerminalSurface::new(Vec::new(), Mode::Game);
        surface.on_cell_changed(5, 0, Symbol::X);
        surface.on_cell_interactivity_changed(0, 9, true);
        surface.flush();
        assert_eq!(output(surface), "");
    }
}
