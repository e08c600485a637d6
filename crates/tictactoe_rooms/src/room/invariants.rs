//! Invariants every well-formed room document satisfies.

use tictactoe_rules::{
    BalancedMarksInvariant, CELL_COUNT, Invariant, Square, WINNING_LINES, is_full,
};

use crate::room::{Room, RoomStatus};

/// Invariant: the creator seat is always taken.
pub struct HasCreatorInvariant;

impl Invariant<Room> for HasCreatorInvariant {
    fn holds(room: &Room) -> bool {
        !room.player_x.is_empty()
    }

    fn description() -> &'static str {
        "Room has a creator"
    }
}

/// Invariant: `waiting` exactly when the second seat is free.
pub struct SeatsMatchStatusInvariant;

impl Invariant<Room> for SeatsMatchStatusInvariant {
    fn holds(room: &Room) -> bool {
        (room.status == RoomStatus::Waiting) == room.player_o.is_empty()
    }

    fn description() -> &'static str {
        "Status is waiting exactly when the second seat is free"
    }
}

/// Invariant: a playing room has no winner, a free cell, and mark counts
/// consistent with whose turn it is.
pub struct PlayingIsUndecidedInvariant;

impl Invariant<Room> for PlayingIsUndecidedInvariant {
    fn holds(room: &Room) -> bool {
        if room.status != RoomStatus::Playing {
            return true;
        }
        let to_move = room.board.count(room.turn);
        let waiting = room.board.count(room.turn.opponent());
        room.winner.is_none()
            && room.winning_line.is_empty()
            && room.board.empty_count() > 0
            && BalancedMarksInvariant::holds(&room.board)
            && to_move <= waiting
    }

    fn description() -> &'static str {
        "Playing rooms have no winner, a free cell and a consistent turn"
    }
}

/// Invariant: a finished room is either a win along a real triple or a
/// full board without a winner.
pub struct FinishedIsDecidedInvariant;

impl Invariant<Room> for FinishedIsDecidedInvariant {
    fn holds(room: &Room) -> bool {
        if room.status != RoomStatus::Finished {
            return true;
        }
        match room.winner {
            Some(winner) => {
                let Ok(line) = <[usize; 3]>::try_from(room.winning_line.as_slice()) else {
                    return false;
                };
                WINNING_LINES.contains(&line)
                    && line
                        .iter()
                        .all(|i| *i < CELL_COUNT && room.board.get(*i) == Some(Square::Occupied(winner)))
            }
            None => room.winning_line.is_empty() && is_full(&room.board),
        }
    }

    fn description() -> &'static str {
        "Finished rooms hold a winning triple or a full drawn board"
    }
}

/// All room invariants as a composable set.
pub type RoomInvariants = (
    HasCreatorInvariant,
    SeatsMatchStatusInvariant,
    PlayingIsUndecidedInvariant,
    FinishedIsDecidedInvariant,
);
