//! Win and draw detection for tic-tac-toe.

use super::draw::is_full;
use crate::types::{Board, Mark, Square};
use tracing::instrument;

/// All eight winning triples in scan order: rows top to bottom, then
/// columns left to right, then the two diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No winner and at least one empty cell.
    InProgress,
    /// A mark completed a triple.
    Won {
        /// Winning mark.
        winner: Mark,
        /// First completed triple in scan order.
        line: [usize; 3],
    },
    /// Board full with no winner.
    Draw,
}

impl Outcome {
    /// Winning mark, if any.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Won { winner, .. } => Some(*winner),
            _ => None,
        }
    }

    /// Winning triple, empty unless the game was won.
    pub fn line(&self) -> Vec<usize> {
        match self {
            Outcome::Won { line, .. } => line.to_vec(),
            _ => Vec::new(),
        }
    }

    /// True iff the board is full with no winner.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }

    /// True for a win or a draw.
    pub fn is_over(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Evaluates the board.
///
/// When one move completes two triples of the same mark, the first in
/// [`WINNING_LINES`] order is reported.
#[instrument]
pub fn detect_outcome(board: &Board) -> Outcome {
    for line in WINNING_LINES {
        let [a, b, c] = line;
        if let Some(Square::Occupied(mark)) = board.get(a)
            && board.get(b) == Some(Square::Occupied(mark))
            && board.get(c) == Some(Square::Occupied(mark))
        {
            return Outcome::Won { winner: mark, line };
        }
    }

    if is_full(board) {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(cells: &str) -> Board {
        let mut squares = [Square::Empty; 9];
        for (i, ch) in cells.chars().enumerate() {
            squares[i] = match ch {
                'X' => Square::Occupied(Mark::X),
                'O' => Square::Occupied(Mark::O),
                _ => Square::Empty,
            };
        }
        Board::from_squares(squares)
    }

    #[test]
    fn test_no_winner_empty_board() {
        assert_eq!(detect_outcome(&Board::new()), Outcome::InProgress);
    }

    #[test]
    fn test_every_line_is_detected() {
        for line in WINNING_LINES {
            let mut squares = [Square::Empty; 9];
            for i in line {
                squares[i] = Square::Occupied(Mark::O);
            }
            let outcome = detect_outcome(&Board::from_squares(squares));
            assert_eq!(outcome, Outcome::Won { winner: Mark::O, line });
        }
    }

    #[test]
    fn test_double_line_reports_first_in_scan_order() {
        // X completes the top row and the left column with the corner.
        let board = board_from("XXXXOOXO.");
        assert_eq!(
            detect_outcome(&board),
            Outcome::Won { winner: Mark::X, line: [0, 1, 2] }
        );
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let outcome = detect_outcome(&board_from("XOXXOOOXX"));
        assert!(outcome.is_draw());
        assert_eq!(outcome.winner(), None);
        assert!(outcome.line().is_empty());
    }

    #[test]
    fn test_win_on_last_cell_is_not_draw() {
        let outcome = detect_outcome(&board_from("XOXOXOOXX"));
        assert_eq!(outcome.winner(), Some(Mark::X));
        assert!(!outcome.is_draw());
    }
}
