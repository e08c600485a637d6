//! Room lifecycle: create, join, move, restart, leave.
//!
//! [`RoomManager`] owns every state transition of a room document. Gates
//! that two participants may race on (the free seat, the finished round)
//! go through [`RoomStore::transact`]; moves are serialized by the turn
//! token and committed as a plain overwrite unless configured otherwise.

use serde::{Deserialize, Serialize};
use tictactoe_rules::{
    InvariantSet, Mark, Outcome, StartRule, apply_move, detect_outcome, next_turn, opening_mark,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{RoomError, RoomErrorKind};
use crate::room::{Room, RoomCode, RoomInvariants, RoomPatch, RoomStatus};
use crate::store::RoomStore;

/// Default number of fresh codes tried by [`RoomManager::create_with_fresh_code`].
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 8;

/// How a computed move is written back.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MoveCommit {
    /// Compute against the local snapshot and overwrite the document.
    #[default]
    Overwrite,
    /// Re-validate against a fresh read inside a transaction.
    Transaction,
}

/// Applies room state transitions through a [`RoomStore`].
#[derive(Debug, Clone)]
pub struct RoomManager {
    store: RoomStore,
    move_commit: MoveCommit,
    max_code_attempts: u32,
}

impl RoomManager {
    /// Creates a manager with the given move commit mode.
    #[instrument(skip(store))]
    pub fn new(store: RoomStore, move_commit: MoveCommit, max_code_attempts: u32) -> Self {
        info!("Creating RoomManager");
        Self {
            store,
            move_commit,
            max_code_attempts: max_code_attempts.max(1),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Configured move commit mode.
    pub fn move_commit(&self) -> MoveCommit {
        self.move_commit
    }

    /// Opens a room under `code` with the host seated as `X`.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::CodeTaken`] if a room already lives under `code`.
    #[instrument(skip(self, host_name), fields(code = %code, host_id = %host_id))]
    pub async fn create(
        &self,
        code: &RoomCode,
        host_id: &str,
        host_name: &str,
        is_public: bool,
    ) -> Result<Room, RoomError> {
        if self.store.try_get(code).await?.is_some() {
            warn!("Room code already in use");
            return Err(RoomError::new(RoomErrorKind::CodeTaken(code.to_string())));
        }

        let room = Room::new_waiting(code.clone(), host_id.to_string(), host_name.to_string(), is_public);
        check_invariants(&room)?;
        self.store.set(&room).await?;
        info!(is_public, "Room created");
        Ok(room)
    }

    /// Opens a room under a freshly generated code, retrying on collisions.
    #[instrument(skip(self, host_name), fields(host_id = %host_id))]
    pub async fn create_with_fresh_code(
        &self,
        host_id: &str,
        host_name: &str,
        is_public: bool,
    ) -> Result<Room, RoomError> {
        let mut last_error = None;
        for attempt in 1..=self.max_code_attempts {
            let code = RoomCode::generate(&mut rand::thread_rng());
            match self.create(&code, host_id, host_name, is_public).await {
                Ok(room) => return Ok(room),
                Err(e) if matches!(e.kind(), RoomErrorKind::CodeTaken(_)) => {
                    debug!(attempt, code = %code, "Generated code collided, trying another");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        warn!(attempts = self.max_code_attempts, "No free room code found");
        Err(last_error.unwrap_or_else(|| RoomError::unavailable("no room code attempted")))
    }

    /// Takes the second seat and starts a round.
    ///
    /// Joining again with the id already in the second seat returns the room
    /// as it is and writes nothing.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::RoomFull`] if someone else holds the seat or the
    /// joiner is the host; [`RoomErrorKind::RoomNotFound`] if the room is
    /// gone.
    #[instrument(skip(self, joiner_name), fields(code = %code, joiner_id = %joiner_id))]
    pub async fn join(
        &self,
        code: &RoomCode,
        joiner_id: &str,
        joiner_name: &str,
    ) -> Result<Room, RoomError> {
        if joiner_id.is_empty() {
            warn!("Join without a participant id");
            return Err(RoomError::invalid_move("a participant id is required to join"));
        }
        let room = self
            .store
            .transact(code, |mut room| {
                if room.player_x == joiner_id {
                    return Err(RoomError::new(RoomErrorKind::RoomFull(code.to_string())));
                }
                if !room.is_open() && room.player_o == joiner_id {
                    debug!("Already seated, nothing to change");
                    return Ok(room);
                }
                if !room.is_open() {
                    return Err(RoomError::new(RoomErrorKind::RoomFull(code.to_string())));
                }
                room.player_o = joiner_id.to_string();
                room.player_o_name = joiner_name.to_string();
                room.reset_round(Mark::X);
                check_invariants(&room)?;
                Ok(room)
            })
            .await?;
        info!(status = %room.status, "Joined room");
        Ok(room)
    }

    /// Plays `mover` at `index`.
    ///
    /// `snapshot` is the caller's latest copy of the room. With
    /// [`MoveCommit::Overwrite`] the next document is computed from it and
    /// written unconditionally; with [`MoveCommit::Transaction`] only its
    /// code is used and the move is validated against a fresh read.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::InvalidMove`] when the round is not running, it is
    /// not `mover`'s turn, or the cell is taken or out of range.
    #[instrument(skip(self, snapshot), fields(code = %snapshot.code, commit = %self.move_commit))]
    pub async fn make_move(&self, snapshot: &Room, mover: Mark, index: usize) -> Result<Room, RoomError> {
        let room = match self.move_commit {
            MoveCommit::Overwrite => {
                let next = advance(snapshot.clone(), mover, index)?;
                self.store.set(&next).await?;
                next
            }
            MoveCommit::Transaction => {
                self.store
                    .transact(&snapshot.code, |room| advance(room, mover, index))
                    .await?
            }
        };
        info!(status = %room.status, winner = ?room.winner, "Move committed");
        Ok(room)
    }

    /// Starts a new round in a finished room.
    ///
    /// The opening mark is decided once, before the transaction, so a
    /// retried attempt writes the same opener.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::InvalidMove`] if the room is not finished.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn restart(
        &self,
        code: &RoomCode,
        rule: StartRule,
        prev_winner: Option<Mark>,
    ) -> Result<Room, RoomError> {
        let opener = opening_mark(rule, prev_winner, &mut rand::thread_rng());
        debug!(%opener, "Opening mark chosen");

        let room = self
            .store
            .transact(code, |mut room| {
                if room.status != RoomStatus::Finished {
                    return Err(RoomError::invalid_move(format!(
                        "cannot restart while the room is {}",
                        room.status
                    )));
                }
                room.reset_round(opener);
                check_invariants(&room)?;
                Ok(room)
            })
            .await?;
        info!(turn = %room.turn, wins_x = room.wins_x, wins_o = room.wins_o, "Round restarted");
        Ok(room)
    }

    /// Leaves a room. The host deletes it; the joiner frees the seat.
    ///
    /// Leaving a room that is already gone writes nothing.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::InvalidMove`] if `participant_id` does not hold the
    /// seat `is_host` claims.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn leave(&self, code: &RoomCode, participant_id: &str, is_host: bool) -> Result<(), RoomError> {
        let Some(room) = self.store.try_get(code).await? else {
            debug!("Room already gone, nothing to leave");
            return Ok(());
        };

        match room.mark_of(participant_id) {
            Some(Mark::X) if is_host => {
                self.store.delete(code).await?;
                info!("Host left, room closed");
            }
            Some(Mark::O) if !is_host => {
                self.store
                    .update_fields(code, &RoomPatch::vacate_second_seat())
                    .await?;
                info!("Joiner left, room waiting again");
            }
            seat => {
                warn!(?seat, is_host, "Leave from a participant not in that seat");
                return Err(RoomError::invalid_move(format!(
                    "{} does not hold the {} seat in room {}",
                    participant_id,
                    if is_host { "host" } else { "second" },
                    code
                )));
            }
        }
        Ok(())
    }

    /// Snapshot of all public rooms, sorted by code.
    #[instrument(skip(self))]
    pub async fn list_public(&self) -> Result<Vec<Room>, RoomError> {
        self.store.list_public().await
    }
}

/// Computes the document after `mover` plays `index`.
#[instrument(skip(room), fields(code = %room.code, turn = %room.turn))]
fn advance(mut room: Room, mover: Mark, index: usize) -> Result<Room, RoomError> {
    if room.status != RoomStatus::Playing {
        warn!(status = %room.status, "Move outside a running round");
        return Err(RoomError::invalid_move(format!("the room is {}", room.status)));
    }
    if room.turn != mover {
        warn!(%mover, "Move out of turn");
        return Err(RoomError::invalid_move(format!("it is {}'s turn", room.turn)));
    }

    room.board = apply_move(&room.board, index, mover)?;
    match detect_outcome(&room.board) {
        Outcome::Won { winner, line } => {
            room.winner = Some(winner);
            room.winning_line = line.to_vec();
            room.status = RoomStatus::Finished;
            match winner {
                Mark::X => room.wins_x = room.wins_x.saturating_add(1),
                Mark::O => room.wins_o = room.wins_o.saturating_add(1),
            }
            info!(%winner, ?line, "Round won");
        }
        Outcome::Draw => {
            room.status = RoomStatus::Finished;
            info!("Round drawn");
        }
        Outcome::InProgress => {
            room.turn = next_turn(mover);
        }
    }

    check_invariants(&room)?;
    Ok(room)
}

fn check_invariants(room: &Room) -> Result<(), RoomError> {
    RoomInvariants::check_all(room).map_err(|violations| {
        let described: Vec<String> = violations.iter().map(ToString::to_string).collect();
        warn!(code = %room.code, ?described, "Refusing to write inconsistent room");
        RoomError::invalid_move(described.join("; "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictactoe_rules::Board;

    fn playing_room() -> Room {
        let mut room = Room::new_waiting(RoomCode::parse("AB3D").unwrap(), "p1".into(), "Alice".into(), false);
        room.player_o = "p2".into();
        room.player_o_name = "Bob".into();
        room.reset_round(Mark::X);
        room
    }

    #[test]
    fn test_advance_flips_turn() {
        let room = advance(playing_room(), Mark::X, 4).unwrap();
        assert_eq!(room.turn, Mark::O);
        assert_eq!(room.status, RoomStatus::Playing);
        assert!(!room.board.is_empty(4));
    }

    #[test]
    fn test_advance_rejects_out_of_turn() {
        let err = advance(playing_room(), Mark::O, 4).unwrap_err();
        assert!(matches!(err.kind(), RoomErrorKind::InvalidMove(_)));
    }

    #[test]
    fn test_advance_rejects_taken_cell() {
        let room = advance(playing_room(), Mark::X, 4).unwrap();
        let err = advance(room, Mark::O, 4).unwrap_err();
        assert!(matches!(err.kind(), RoomErrorKind::InvalidMove(_)));
    }

    #[test]
    fn test_advance_rejects_waiting_room() {
        let room = Room::new_waiting(RoomCode::parse("AB3D").unwrap(), "p1".into(), "Alice".into(), false);
        assert!(advance(room, Mark::X, 0).is_err());
    }

    #[test]
    fn test_winning_move_scores() {
        let mut room = playing_room();
        for (mark, index) in [(Mark::X, 0), (Mark::O, 3), (Mark::X, 1), (Mark::O, 4)] {
            room = advance(room, mark, index).unwrap();
        }
        let room = advance(room, Mark::X, 2).unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.winner, Some(Mark::X));
        assert_eq!(room.winning_line, vec![0, 1, 2]);
        assert_eq!((room.wins_x, room.wins_o), (1, 0));
    }

    #[test]
    fn test_win_counter_saturates() {
        let mut room = playing_room();
        room.wins_x = u32::MAX;
        for (mark, index) in [(Mark::X, 0), (Mark::O, 3), (Mark::X, 1), (Mark::O, 4)] {
            room = advance(room, mark, index).unwrap();
        }
        let room = advance(room, Mark::X, 2).unwrap();
        assert_eq!(room.winner, Some(Mark::X));
        assert_eq!(room.wins_x, u32::MAX);
    }

    #[test]
    fn test_draw_scores_nobody() {
        let mut room = playing_room();
        // X O X / X O O / O X X
        for (mark, index) in [
            (Mark::X, 0),
            (Mark::O, 1),
            (Mark::X, 2),
            (Mark::O, 4),
            (Mark::X, 3),
            (Mark::O, 5),
            (Mark::X, 7),
            (Mark::O, 6),
        ] {
            room = advance(room, mark, index).unwrap();
        }
        let room = advance(room, Mark::X, 8).unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.winner, None);
        assert!(room.winning_line.is_empty());
        assert_eq!((room.wins_x, room.wins_o), (0, 0));
        assert_eq!(room.board.empty_count(), 0);
        assert_ne!(room.board, Board::new());
    }

    #[test]
    fn test_move_commit_parses() {
        assert_eq!("transaction".parse::<MoveCommit>().unwrap(), MoveCommit::Transaction);
        assert_eq!(MoveCommit::default().to_string(), "overwrite");
    }
}
