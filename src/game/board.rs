//! Board engine - pure 3x3 grid state with win and draw detection

use super::Symbol;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width and height of the grid
pub const BOARD_SIZE: usize = 3;

/// Every winning line: 3 rows, 3 columns, 2 diagonals
const LINES: [[(usize, usize); 3]; 8] = [
    // Rows
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    // Columns
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    // Diagonals
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

/// An in-range cell coordinate
///
/// Holding a `Position` means the range check has already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    row: usize,
    col: usize,
}

impl Position {
    /// Validate raw client coordinates, `None` when outside `[0, 3)`
    pub fn new(row: i64, col: i64) -> Option<Self> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some(Self { row, col })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

/// The grid; `None` marks an empty cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// An empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from explicit rows
    pub fn from_rows(cells: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// Mark at `pos`
    pub fn get(&self, pos: Position) -> Option<Symbol> {
        self.cells[pos.row][pos.col]
    }

    /// Whether the cell at `pos` is unoccupied
    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos).is_none()
    }

    /// Board with `symbol` placed at `pos`
    ///
    /// Callers must check `is_empty_at` first; an occupied cell is overwritten.
    #[must_use]
    pub fn apply_move(mut self, pos: Position, symbol: Symbol) -> Self {
        self.cells[pos.row][pos.col] = Some(symbol);
        self
    }

    /// Rows of the grid
    pub fn rows(&self) -> &[[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }
}

/// True iff some row, column or diagonal is filled entirely with `symbol`
pub fn check_win(board: &Board, symbol: Symbol) -> bool {
    LINES
        .iter()
        .any(|line| line.iter().all(|&(r, c)| board.cells[r][c] == Some(symbol)))
}

/// True iff no cell is empty
///
/// A full board can still hold a winning line; check for a win first.
pub fn check_draw(board: &Board) -> bool {
    board.cells.iter().flatten().all(Option::is_some)
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<[&str; BOARD_SIZE]> = self
            .cells
            .iter()
            .map(|row| row.map(|cell| cell.map_or("", Symbol::as_str)))
            .collect();
        rows.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = <[[String; BOARD_SIZE]; BOARD_SIZE]>::deserialize(deserializer)?;
        let mut cells = [[None; BOARD_SIZE]; BOARD_SIZE];
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                cells[r][c] = match cell.as_str() {
                    "" => None,
                    other => Some(Symbol::from_wire(other).ok_or_else(|| {
                        D::Error::custom(format!("invalid cell mark: {:?}", other))
                    })?),
                };
            }
        }
        Ok(Self { cells })
    }
}
