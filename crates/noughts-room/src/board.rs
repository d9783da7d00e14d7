//! The board engine: pure functions over a [`Grid`].
//!
//! Nothing here knows about turns, seats, or clocks. The room decides
//! whether a move is allowed; this module only applies it and judges the
//! resulting position.

use noughts_protocol::{Coord, Grid, Line, Outcome, Symbol};

const fn at(row: usize, col: usize) -> Coord {
    Coord { row, col }
}

/// Every line that wins, in scan order: rows, then columns, then the
/// two diagonals.
const LINES: [Line; 8] = [
    [at(0, 0), at(0, 1), at(0, 2)],
    [at(1, 0), at(1, 1), at(1, 2)],
    [at(2, 0), at(2, 1), at(2, 2)],
    [at(0, 0), at(1, 0), at(2, 0)],
    [at(0, 1), at(1, 1), at(2, 1)],
    [at(0, 2), at(1, 2), at(2, 2)],
    [at(0, 0), at(1, 1), at(2, 2)],
    [at(0, 2), at(1, 1), at(2, 0)],
];

/// Places `symbol` at `coord` and returns the new grid.
///
/// The caller guarantees the cell is empty.
pub fn apply_move(grid: Grid, symbol: Symbol, coord: Coord) -> Grid {
    debug_assert!(grid.get(coord).is_none(), "cell {coord:?} already set");
    grid.with(coord, symbol)
}

/// Judges a position.
///
/// Returns the first complete line as a [`Outcome::Win`], [`Outcome::Tie`]
/// when the board is full without one, and `None` while play continues.
pub fn evaluate(grid: &Grid) -> Option<Outcome> {
    for line in LINES {
        let [a, b, c] = line;
        if let Some(symbol) = grid.get(a) {
            if grid.get(b) == Some(symbol) && grid.get(c) == Some(symbol) {
                return Some(Outcome::Win {
                    winner: symbol,
                    line: Some(line),
                });
            }
        }
    }

    grid.is_full().then_some(Outcome::Tie)
}
