//! The shared room document.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tictactoe_rules::{Board, CELL_COUNT, Mark};
use tracing::instrument;

use crate::room::RoomCode;

/// Lifecycle status of a room. Exactly one holds at any time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoomStatus {
    /// Creator seated, second seat free.
    #[default]
    Waiting,
    /// Both seats taken and a round in progress.
    Playing,
    /// Round ended in a win or a draw.
    Finished,
}

/// One match's full state, as shared by both participants.
///
/// `winner = None` means "in progress" while playing and "draw" once
/// finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Document key; immutable.
    pub code: RoomCode,
    /// Cells in row-major order.
    pub board: Board,
    /// Whose move is next; meaningful only while playing.
    pub turn: Mark,
    /// Creator's participant id (plays `X`).
    pub player_x: String,
    /// Joiner's participant id (plays `O`); empty while waiting.
    pub player_o: String,
    /// Creator's display name.
    pub player_x_name: String,
    /// Joiner's display name.
    pub player_o_name: String,
    /// Whether the room appears in the public listing.
    pub is_public: bool,
    /// Winning mark of the current round.
    pub winner: Option<Mark>,
    /// The winning triple, empty otherwise.
    pub winning_line: Vec<usize>,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Rounds won by `X` in this room.
    pub wins_x: u32,
    /// Rounds won by `O` in this room.
    pub wins_o: u32,
}

impl Room {
    /// Creates a freshly opened room with only the creator seated.
    #[instrument(skip(host_id, host_name), fields(code = %code))]
    pub fn new_waiting(code: RoomCode, host_id: String, host_name: String, is_public: bool) -> Self {
        Self {
            code,
            board: Board::new(),
            turn: Mark::X,
            player_x: host_id,
            player_o: String::new(),
            player_x_name: host_name,
            player_o_name: String::new(),
            is_public,
            winner: None,
            winning_line: Vec::new(),
            status: RoomStatus::Waiting,
            wins_x: 0,
            wins_o: 0,
        }
    }

    /// True while the second seat is free.
    pub fn is_open(&self) -> bool {
        self.player_o.is_empty()
    }

    /// Mark played by `player_id`, if seated.
    pub fn mark_of(&self, player_id: &str) -> Option<Mark> {
        if player_id.is_empty() {
            None
        } else if self.player_x == player_id {
            Some(Mark::X)
        } else if self.player_o == player_id {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Display name of the participant playing `mark`.
    pub fn name_of(&self, mark: Mark) -> &str {
        match mark {
            Mark::X => &self.player_x_name,
            Mark::O => &self.player_o_name,
        }
    }

    /// Rounds won by `mark`.
    pub fn score(&self, mark: Mark) -> u32 {
        match mark {
            Mark::X => self.wins_x,
            Mark::O => self.wins_o,
        }
    }

    /// Clears the board for a new round, keeping seats and scores.
    pub(crate) fn reset_round(&mut self, opener: Mark) {
        self.board = Board::new();
        self.turn = opener;
        self.winner = None;
        self.winning_line.clear();
        self.status = RoomStatus::Playing;
    }

    /// Serializes the room into its persisted JSON layout.
    pub fn to_document(&self) -> serde_json::Value {
        let mut board = [" "; CELL_COUNT];
        for (slot, square) in board.iter_mut().zip(self.board.squares()) {
            *slot = square.symbol();
        }
        let document = RoomDocument {
            code: self.code.as_str(),
            board,
            turn: self.turn.symbol(),
            player_x: &self.player_x,
            player_o: &self.player_o,
            player_x_name: &self.player_x_name,
            player_o_name: &self.player_o_name,
            is_public: self.is_public,
            winner: self.winner.map(Mark::symbol).unwrap_or(""),
            winning_line: &self.winning_line,
            status: self.status,
            wins_x: self.wins_x,
            wins_o: self.wins_o,
        };
        serde_json::json!(document)
    }
}

/// Persisted layout of a room, field names as stored remotely.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomDocument<'a> {
    code: &'a str,
    board: [&'static str; CELL_COUNT],
    turn: &'static str,
    player_x: &'a str,
    player_o: &'a str,
    player_x_name: &'a str,
    player_o_name: &'a str,
    is_public: bool,
    winner: &'static str,
    winning_line: &'a [usize],
    status: RoomStatus,
    wins_x: u32,
    wins_o: u32,
}

/// Partial update merged into a stored room; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Setters)]
#[serde(rename_all = "camelCase")]
#[setters(strip_option, into)]
pub struct RoomPatch {
    /// New joiner id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_o: Option<String>,
    /// New joiner name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_o_name: Option<String>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
}

impl RoomPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that frees the second seat and returns the room to waiting.
    pub fn vacate_second_seat() -> Self {
        Self::new()
            .player_o("")
            .player_o_name("")
            .status(RoomStatus::Waiting)
    }

    /// Field map with persisted names.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::json!(self) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// True if the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.player_o.is_none() && self.player_o_name.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new_waiting(
            RoomCode::parse("AB3D").unwrap(),
            "p1".into(),
            "Alice".into(),
            true,
        )
    }

    #[test]
    fn test_new_room_is_waiting() {
        let room = room();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert!(room.is_open());
        assert_eq!(room.turn, Mark::X);
        assert_eq!(room.mark_of("p1"), Some(Mark::X));
        assert_eq!(room.mark_of(""), None);
    }

    #[test]
    fn test_document_uses_persisted_names() {
        let doc = room().to_document();
        assert_eq!(doc["code"], "AB3D");
        assert_eq!(doc["playerX"], "p1");
        assert_eq!(doc["playerXName"], "Alice");
        assert_eq!(doc["playerO"], "");
        assert_eq!(doc["isPublic"], true);
        assert_eq!(doc["status"], "waiting");
        assert_eq!(doc["winner"], "");
        assert_eq!(doc["winsX"], 0);
        assert_eq!(doc["board"].as_array().map(Vec::len), Some(9));
        assert_eq!(doc["board"][0], " ");
    }

    #[test]
    fn test_vacate_patch_fields() {
        let fields = RoomPatch::vacate_second_seat().to_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["playerO"], "");
        assert_eq!(fields["playerOName"], "");
        assert_eq!(fields["status"], "waiting");
        assert!(RoomPatch::new().to_fields().is_empty());
    }
}
