//! Pure tic-tac-toe rules.
//!
//! Stateless functions that apply a move, detect the outcome of a board and
//! compute turn order. Both participants of a shared room run the same
//! functions, so a committed document can be re-derived and checked by
//! either side.
//!
//! ```
//! use tictactoe_rules::{Board, Mark, Outcome, apply_move, detect_outcome};
//!
//! let board = apply_move(&Board::new(), 4, Mark::X).unwrap();
//! assert_eq!(detect_outcome(&board), Outcome::InProgress);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod invariants;
mod position;
mod restart;
mod rules;
mod types;

pub use invariants::{BalancedMarksInvariant, Invariant, InvariantSet, InvariantViolation};
pub use position::Position;
pub use restart::{DEFAULT_OPENER, StartRule, opening_mark};
pub use rules::{MoveError, Outcome, WINNING_LINES, apply_move, detect_outcome, is_full, next_turn};
pub use types::{Board, CELL_COUNT, Mark, Square};
