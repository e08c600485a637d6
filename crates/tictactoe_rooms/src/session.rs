//! Per-client session state machine.
//!
//! [`Session`] holds what one participant knows about the room they sit in:
//! their seat, the latest cached [`Room`] and whether a mutation is still
//! outstanding. It performs no I/O. Local commands are validated into a
//! [`Mutation`] for the caller to execute, and sync events and mutation
//! results are folded back in as [`SessionUpdate`]s.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use tictactoe_rules::{CELL_COUNT, Mark, StartRule};
use tracing::{debug, info, instrument, warn};

use crate::error::{RoomError, RoomErrorKind};
use crate::room::{Room, RoomCode, RoomStatus};
use crate::sync::SyncEvent;

/// Coarse screen the participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Phase {
    /// Not in a room.
    Menu,
    /// Seated, waiting for an opponent.
    Lobby,
    /// Round running or finished.
    Game,
}

/// Where the participant sits.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Seat {
    /// Room code.
    code: RoomCode,
    /// Mark played from this seat.
    mark: Mark,
}

impl Seat {
    /// True for the creator's seat.
    pub fn is_host(&self) -> bool {
        self.mark == Mark::X
    }
}

/// Something the local participant asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Place the participant's mark at a cell index.
    Move(usize),
    /// Start the next round with the given rule.
    Restart(StartRule),
    /// Abandon the room.
    Leave,
}

/// A validated store operation to perform on the participant's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Commit a move computed from the cached room.
    Move {
        /// Latest cached copy at submission time.
        room: Room,
        /// Mark being played.
        mover: Mark,
        /// Target cell.
        index: usize,
    },
    /// Restart a finished room.
    Restart {
        /// Room to restart.
        code: RoomCode,
        /// Opening rule.
        rule: StartRule,
        /// Winner of the finished round.
        prev_winner: Option<Mark>,
    },
    /// Leave the room; the session has already returned to the menu.
    Leave {
        /// Room being left.
        code: RoomCode,
        /// Whether the leaver created the room.
        is_host: bool,
    },
}

/// Why a local command was refused before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum Rejection {
    /// No room joined.
    #[display("You are not in a room")]
    NotInRoom,
    /// The opponent is to move.
    #[display("It is not your turn")]
    NotYourTurn,
    /// Cell occupied or out of range.
    #[display("Cell {} is not available", _0)]
    CellTaken(#[error(not(source))] usize),
    /// Restart requested before the round ended.
    #[display("The game is not over yet")]
    GameNotOver,
    /// Move requested while no round is running.
    #[display("No game is in progress")]
    GameNotRunning,
    /// A previous mutation has not completed.
    #[display("Still waiting for the previous action")]
    MutationPending,
}

impl From<Rejection> for RoomError {
    #[track_caller]
    fn from(rejection: Rejection) -> Self {
        RoomError::invalid_move(rejection.to_string())
    }
}

/// What changed after folding in an event or result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Cached room replaced with no transition of interest.
    Refreshed,
    /// Someone took the second seat.
    OpponentJoined {
        /// Their display name.
        name: String,
    },
    /// The round ended; `None` is a draw.
    GameFinished {
        /// Winning mark.
        winner: Option<Mark>,
    },
    /// A new round started.
    Restarted {
        /// Mark to move first.
        turn: Mark,
    },
    /// The joiner left; the room is waiting again.
    OpponentLeft,
    /// The room no longer exists for this participant.
    RoomClosed,
    /// The store could not be reached; state unchanged.
    Unavailable(String),
    /// The event belonged to a room this session no longer sits in.
    Ignored,
}

/// State of one participant.
#[derive(Debug, Clone)]
pub struct Session {
    player_id: String,
    player_name: String,
    seat: Option<Seat>,
    room: Option<Room>,
    pending: bool,
    notice: Option<String>,
}

impl Session {
    /// Creates a session on the menu.
    pub fn new(player_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            seat: None,
            room: None,
            pending: false,
            notice: None,
        }
    }

    /// Participant id.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Display name.
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Current seat, if any.
    pub fn seat(&self) -> Option<&Seat> {
        self.seat.as_ref()
    }

    /// Latest cached room.
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// True while a mutation is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Last message for display.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match (&self.seat, &self.room) {
            (None, _) => Phase::Menu,
            (Some(_), Some(room)) if room.status != RoomStatus::Waiting => Phase::Game,
            (Some(_), _) => Phase::Lobby,
        }
    }

    /// True when a move from this participant would be accepted.
    pub fn is_my_turn(&self) -> bool {
        match (&self.seat, &self.room) {
            (Some(seat), Some(room)) => room.status == RoomStatus::Playing && room.turn == seat.mark,
            _ => false,
        }
    }

    /// Sits down in `room` after a successful create or join.
    ///
    /// # Errors
    ///
    /// [`Rejection::NotInRoom`] if this participant holds neither seat.
    #[instrument(skip(self, room), fields(player_id = %self.player_id, code = %room.code))]
    pub fn enter(&mut self, room: Room) -> Result<&Seat, Rejection> {
        let mark = room.mark_of(&self.player_id).ok_or(Rejection::NotInRoom)?;
        info!(%mark, "Entered room");
        self.pending = false;
        self.notice = None;
        self.room = Some(room.clone());
        Ok(self.seat.insert(Seat::new(room.code, mark)))
    }

    /// Validates `command` against the cached room.
    ///
    /// An accepted move or restart marks the session pending until
    /// [`complete`](Self::complete) is called. An accepted leave returns
    /// the session to the menu at once.
    #[instrument(skip(self), fields(player_id = %self.player_id))]
    pub fn request(&mut self, command: Command) -> Result<Mutation, Rejection> {
        let (Some(seat), Some(room)) = (&self.seat, &self.room) else {
            return Err(Rejection::NotInRoom);
        };
        if self.pending {
            debug!("Command refused while a mutation is pending");
            return Err(Rejection::MutationPending);
        }

        let mutation = match command {
            Command::Move(index) => {
                if room.status != RoomStatus::Playing {
                    return Err(Rejection::GameNotRunning);
                }
                if room.turn != seat.mark {
                    return Err(Rejection::NotYourTurn);
                }
                if index >= CELL_COUNT || !room.board.is_empty(index) {
                    return Err(Rejection::CellTaken(index));
                }
                Mutation::Move {
                    room: room.clone(),
                    mover: seat.mark,
                    index,
                }
            }
            Command::Restart(rule) => {
                if room.status != RoomStatus::Finished {
                    return Err(Rejection::GameNotOver);
                }
                Mutation::Restart {
                    code: room.code.clone(),
                    rule,
                    prev_winner: room.winner,
                }
            }
            Command::Leave => {
                let mutation = Mutation::Leave {
                    code: seat.code.clone(),
                    is_host: seat.is_host(),
                };
                self.abandon();
                info!("Left room locally");
                return Ok(mutation);
            }
        };

        self.pending = true;
        Ok(mutation)
    }

    /// Folds in the result of a mutation issued for `code`.
    ///
    /// Results for a room the session has since left are ignored.
    #[instrument(skip(self, result), fields(code = %code))]
    pub fn complete(&mut self, code: &RoomCode, result: &Result<Room, RoomError>) -> SessionUpdate {
        if !self.sits_in(code) {
            debug!("Discarding result for an abandoned room");
            return SessionUpdate::Ignored;
        }
        self.pending = false;

        match result {
            Ok(room) => self.replace(room.clone()),
            Err(e) if matches!(e.kind(), RoomErrorKind::RoomNotFound(_)) => {
                self.abandon();
                self.notice = Some(e.message());
                SessionUpdate::RoomClosed
            }
            Err(e) => {
                warn!(error = %e, "Mutation failed");
                self.notice = Some(e.message());
                if e.is_transient() {
                    SessionUpdate::Unavailable(e.message())
                } else {
                    SessionUpdate::Refreshed
                }
            }
        }
    }

    /// Folds in a sync event.
    #[instrument(skip(self, event), fields(code = %event.code()))]
    pub fn apply(&mut self, event: SyncEvent) -> SessionUpdate {
        if !self.sits_in(event.code()) {
            debug!("Event for another room");
            return SessionUpdate::Ignored;
        }

        match event {
            SyncEvent::RoomStateChanged(room) => self.replace(room),
            SyncEvent::RoomGone(_) => {
                info!("Room closed remotely");
                self.abandon();
                self.notice = Some("The room was closed".to_string());
                SessionUpdate::RoomClosed
            }
            SyncEvent::Unavailable { reason, .. } => {
                self.notice = Some(reason.clone());
                SessionUpdate::Unavailable(reason)
            }
        }
    }

    fn sits_in(&self, code: &RoomCode) -> bool {
        self.seat.as_ref().is_some_and(|seat| &seat.code == code)
    }

    fn abandon(&mut self) {
        self.seat = None;
        self.room = None;
        self.pending = false;
    }

    /// Replaces the cached room wholesale and reports the transition.
    fn replace(&mut self, next: Room) -> SessionUpdate {
        let Some(seat) = &self.seat else {
            return SessionUpdate::Ignored;
        };
        if next.mark_of(&self.player_id) != Some(seat.mark) {
            info!("No longer seated in room");
            self.abandon();
            self.notice = Some("You were removed from the room".to_string());
            return SessionUpdate::RoomClosed;
        }

        let update = match &self.room {
            None => SessionUpdate::Refreshed,
            Some(prev) if *prev == next => SessionUpdate::Refreshed,
            Some(prev) => transition(prev, &next),
        };
        if update != SessionUpdate::Refreshed {
            info!(?update, "Room transition");
            self.notice = None;
        }
        self.room = Some(next);
        update
    }
}

fn transition(prev: &Room, next: &Room) -> SessionUpdate {
    use RoomStatus::*;
    match (prev.status, next.status) {
        (Waiting, Playing) => SessionUpdate::OpponentJoined {
            name: next.player_o_name.clone(),
        },
        (Playing, Finished) => SessionUpdate::GameFinished {
            winner: next.winner,
        },
        (Finished, Playing) => SessionUpdate::Restarted { turn: next.turn },
        (Playing | Finished, Waiting) => SessionUpdate::OpponentLeft,
        _ => SessionUpdate::Refreshed,
    }
}
