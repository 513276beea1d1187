//! The 3x3 grid

/// Rows and columns per side
pub const BOARD_SIZE: usize = 3;

/// A checked board coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    row: usize,
    col: usize,
}

impl Position {
    /// `None` when either coordinate is off the board
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some(Self { row, col })
    }

    /// Zero-based row
    pub fn row(self) -> usize {
        self.row
    }

    /// Zero-based column
    pub fn col(self) -> usize {
        self.col
    }

    /// All nine cells in row-major order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Self { row, col }))
    }
}

/// Cell occupancy, relative to this client
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cell {
    /// Nobody has played here
    #[default]
    Empty,
    /// Our mark
    Local,
    /// The opponent's mark
    Remote,
}

impl Cell {
    /// Whether the cell is still free
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

/// Write-once grid: an occupied cell is never overwritten
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board([[Cell; BOARD_SIZE]; BOARD_SIZE]);

impl Board {
    /// An empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupancy at `pos`
    pub fn get(&self, pos: Position) -> Cell {
        self.0[pos.row][pos.col]
    }

    /// Occupy an empty cell. Returns `false` (and leaves the board alone)
    /// when the cell is already taken.
    pub fn place(&mut self, pos: Position, cell: Cell) -> bool {
        let slot = &mut self.0[pos.row][pos.col];
        if !slot.is_empty() || cell.is_empty() {
            return false;
        }
        *slot = cell;
        true
    }

    /// Free cells in row-major order
    pub fn empty_cells(&self) -> impl Iterator<Item = Position> + '_ {
        Position::all().filter(|pos| self.get(*pos).is_empty())
    }

    /// Number of occupied cells
    pub fn occupied(&self) -> usize {
        Position::all().filter(|pos| !self.get(*pos).is_empty()).count()
    }
}
