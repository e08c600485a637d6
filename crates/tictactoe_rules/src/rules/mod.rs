//! Game rules for tic-tac-toe.
//!
//! Pure functions over [`Board`](crate::Board) values. Nothing here performs
//! I/O or holds state, so the same inputs always give the same answers on
//! both clients sharing a room.

pub mod draw;
pub mod moves;
pub mod win;

pub use draw::is_full;
pub use moves::{MoveError, apply_move, next_turn};
pub use win::{Outcome, WINNING_LINES, detect_outcome};
