//! Property tests for the rules engine.

use proptest::prelude::*;
use tictactoe_rules::{
    Board, CELL_COUNT, Mark, Outcome, Square, WINNING_LINES, apply_move, detect_outcome, is_full,
};

fn square() -> impl Strategy<Value = Square> {
    prop_oneof![
        Just(Square::Empty),
        Just(Square::Occupied(Mark::X)),
        Just(Square::Occupied(Mark::O)),
    ]
}

fn board() -> impl Strategy<Value = Board> {
    prop::array::uniform9(square()).prop_map(Board::from_squares)
}

fn mark() -> impl Strategy<Value = Mark> {
    prop_oneof![Just(Mark::X), Just(Mark::O)]
}

proptest! {
    #[test]
    fn winner_always_has_three_marks(board in board(), index in 0..CELL_COUNT, mark in mark()) {
        prop_assume!(board.is_empty(index));
        let next = apply_move(&board, index, mark).unwrap();
        if let Some(winner) = detect_outcome(&next).winner() {
            prop_assert!(next.count(winner) >= 3);
        }
    }

    #[test]
    fn reported_line_belongs_to_winner(board in board()) {
        if let Outcome::Won { winner, line } = detect_outcome(&board) {
            prop_assert!(WINNING_LINES.contains(&line));
            for i in line {
                prop_assert_eq!(board.get(i), Some(Square::Occupied(winner)));
            }
            // No earlier line in scan order is complete.
            let position = WINNING_LINES.iter().position(|l| *l == line).unwrap();
            for earlier in &WINNING_LINES[..position] {
                let first = board.get(earlier[0]);
                let complete = first != Some(Square::Empty)
                    && earlier.iter().all(|i| board.get(*i) == first);
                prop_assert!(!complete);
            }
        }
    }

    #[test]
    fn draw_iff_full_without_winner(board in board()) {
        let outcome = detect_outcome(&board);
        prop_assert_eq!(outcome.is_draw(), is_full(&board) && outcome.winner().is_none());
    }

    #[test]
    fn occupied_cells_reject_moves(board in board(), index in 0..CELL_COUNT, mark in mark()) {
        prop_assume!(!board.is_empty(index));
        prop_assert!(apply_move(&board, index, mark).is_err());
    }
}

#[test]
fn test_each_line_wins_for_each_mark() {
    for mark in [Mark::X, Mark::O] {
        for line in WINNING_LINES {
            let mut squares = [Square::Empty; CELL_COUNT];
            for i in line {
                squares[i] = Square::Occupied(mark);
            }
            let outcome = detect_outcome(&Board::from_squares(squares));
            assert_eq!(outcome, Outcome::Won { winner: mark, line });
        }
    }
}
