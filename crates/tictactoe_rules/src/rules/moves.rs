//! Move application and turn order.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::types::{Board, CELL_COUNT, Mark};

/// Reason a move cannot be applied to a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// Index outside the 9-cell board.
    #[display("Cell {} is out of range (must be 0-8)", _0)]
    OutOfRange(#[error(not(source))] usize),
    /// Target cell already holds a mark.
    #[display("Cell {} is already occupied", _0)]
    Occupied(#[error(not(source))] usize),
}

/// Places `mark` at `index`, returning the new board.
///
/// The input board is left untouched.
///
/// # Errors
///
/// Returns [`MoveError`] if `index` is out of range or the cell is taken.
#[instrument]
pub fn apply_move(board: &Board, index: usize, mark: Mark) -> Result<Board, MoveError> {
    if index >= CELL_COUNT {
        return Err(MoveError::OutOfRange(index));
    }
    if !board.is_empty(index) {
        return Err(MoveError::Occupied(index));
    }
    let mut next = *board;
    next.place(index, mark);
    Ok(next)
}

/// Returns whose move follows `current`.
#[instrument]
pub fn next_turn(current: Mark) -> Mark {
    current.opponent()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_move_places_mark() {
        let board = Board::new();
        let next = apply_move(&board, 4, Mark::X).unwrap();
        assert_eq!(next.get(4), Some(crate::Square::Occupied(Mark::X)));
        assert!(board.is_empty(4), "input board must not change");
    }

    #[test]
    fn test_apply_move_rejects_out_of_range() {
        let board = Board::new();
        assert_eq!(apply_move(&board, 9, Mark::O), Err(MoveError::OutOfRange(9)));
    }

    #[test]
    fn test_apply_move_rejects_occupied() {
        let board = apply_move(&Board::new(), 0, Mark::X).unwrap();
        let result = apply_move(&board, 0, Mark::O);
        assert_eq!(result, Err(MoveError::Occupied(0)));
        assert!(result.unwrap_err().to_string().contains("occupied"));
    }

    #[test]
    fn test_next_turn_flips() {
        assert_eq!(next_turn(Mark::X), Mark::O);
        assert_eq!(next_turn(Mark::O), Mark::X);
    }
}
