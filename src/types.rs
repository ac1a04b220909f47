// Board types shared by the rules, the solver and the HTTP API

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SolverError;

/// Cell coordinate on the board, also used as a move
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Coord { row, col }
    }
}

/// Square grid of cells. `0` is empty, `k` is a piece of player `k - 1`.
///
/// Serialized as a list of rows so requests can carry boards as nested arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct Board {
    size: usize,
    cells: Vec<u8>,
}

impl Board {
    /// Creates an empty `size` x `size` board
    pub fn new(size: usize) -> Self {
        Board {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Builds a board from its rows; fails unless the rows form a square
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, SolverError> {
        let size = rows.len();
        if size == 0 {
            return Err(SolverError::InvalidRequest(
                "board must have at least one row".to_string(),
            ));
        }

        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(SolverError::InvalidRequest(format!(
                    "board is not square: row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            cells.extend(row);
        }

        Ok(Board { size, cells })
    }

    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells.chunks(self.size).map(|r| r.to_vec()).collect()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells in row-major order
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.size && (col as usize) < self.size
    }

    #[inline]
    pub fn get(&self, coord: Coord) -> u8 {
        self.cells[coord.row * self.size + coord.col]
    }

    #[inline]
    pub fn is_empty_at(&self, coord: Coord) -> bool {
        self.get(coord) == 0
    }

    /// Puts a piece of `player` (zero-based) on `coord`. Callers check the cell is empty.
    #[inline]
    pub fn place(&mut self, coord: Coord, player: usize) {
        self.cells[coord.row * self.size + coord.col] = (player + 1) as u8;
    }

    /// Copy of this board with `player`'s piece on `coord`
    pub fn with_move(&self, coord: Coord, player: usize) -> Board {
        let mut next = self.clone();
        next.place(coord, player);
        next
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&c| c != 0)
    }

    /// Number of occupied cells
    pub fn pieces(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }
}

impl TryFrom<Vec<Vec<u8>>> for Board {
    type Error = SolverError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Board::from_rows(rows)
    }
}

impl From<Board> for Vec<Vec<u8>> {
    fn from(board: Board) -> Self {
        board.rows()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size) {
            let line: Vec<String> = row
                .iter()
                .map(|&c| if c == 0 { ".".to_string() } else { c.to_string() })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// Outcome of a terminal check
///
/// A win carries the two outermost cells of the winning run and the cell value
/// of the winner (player index + 1). A draw is `winner_id == -1` with every
/// other field zeroed.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerData {
    pub start: Coord,
    pub end: Coord,
    pub count: usize,
    pub winner_id: i32,
}

impl WinnerData {
    /// The draw sentinel
    pub fn draw() -> Self {
        WinnerData {
            start: Coord::new(0, 0),
            end: Coord::new(0, 0),
            count: 0,
            winner_id: -1,
        }
    }

    pub fn is_draw(&self) -> bool {
        self.winner_id < 0
    }

    /// Zero-based index of the winning player, `None` for a draw
    pub fn winner_player(&self) -> Option<usize> {
        if self.is_draw() {
            None
        } else {
            Some((self.winner_id - 1) as usize)
        }
    }

    /// Cells of the winning line from `start` to `end`, inclusive
    pub fn cells(&self) -> Vec<Coord> {
        if self.is_draw() {
            return Vec::new();
        }

        let step = |from: usize, to: usize| (to as isize - from as isize).signum();
        let dr = step(self.start.row, self.end.row);
        let dc = step(self.start.col, self.end.col);

        (0..self.count as isize)
            .map(|i| {
                Coord::new(
                    (self.start.row as isize + i * dr) as usize,
                    (self.start.col as isize + i * dc) as usize,
                )
            })
            .collect()
    }
}
