//! Room protocol error types.

use derive_more::{Display, Error};
use tictactoe_rules::MoveError;
use tracing::instrument;

/// Specific failure of a room operation.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RoomErrorKind {
    /// Document absent, or present without a creator.
    #[display("Room {} not found", _0)]
    RoomNotFound(String),
    /// Another participant already holds the second seat.
    #[display("Room {} is full", _0)]
    RoomFull(String),
    /// Stale, out-of-turn or otherwise illegal request.
    #[display("Invalid move: {}", _0)]
    InvalidMove(String),
    /// Optimistic retries exhausted.
    #[display("Room {} kept changing underneath {} transaction attempts", code, attempts)]
    TransactionConflict {
        /// Room being mutated.
        code: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// Transport or remote failure.
    #[display("Store unavailable: {}", _0)]
    StoreUnavailable(String),
    /// A room with this code already exists.
    #[display("Room code {} is already in use", _0)]
    CodeTaken(String),
    /// User-supplied room code is malformed.
    #[display("Invalid room code: {}", _0)]
    InvalidCode(String),
}

/// Room error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{} at {}:{}", kind, file, line)]
pub struct RoomError {
    /// What went wrong.
    pub kind: RoomErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl RoomError {
    /// Creates a new room error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: RoomErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`RoomErrorKind::RoomNotFound`].
    #[track_caller]
    pub fn not_found(code: impl Into<String>) -> Self {
        Self::new(RoomErrorKind::RoomNotFound(code.into()))
    }

    /// Shorthand for [`RoomErrorKind::InvalidMove`].
    #[track_caller]
    pub fn invalid_move(reason: impl Into<String>) -> Self {
        Self::new(RoomErrorKind::InvalidMove(reason.into()))
    }

    /// Shorthand for [`RoomErrorKind::StoreUnavailable`].
    #[track_caller]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(RoomErrorKind::StoreUnavailable(reason.into()))
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &RoomErrorKind {
        &self.kind
    }

    /// True for failures worth retrying later: transport trouble and
    /// exhausted transactions.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            RoomErrorKind::StoreUnavailable(_) | RoomErrorKind::TransactionConflict { .. }
        )
    }

    /// True for expected conditions that are shown to the player as-is.
    pub fn is_user_facing(&self) -> bool {
        !self.is_transient()
    }

    /// Message suitable for display, without the source location.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<MoveError> for RoomError {
    #[track_caller]
    fn from(err: MoveError) -> Self {
        Self::new(RoomErrorKind::InvalidMove(err.to_string()))
    }
}

impl From<reqwest::Error> for RoomError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::new(RoomErrorKind::StoreUnavailable(format!("HTTP error: {}", err)))
    }
}

impl From<serde_json::Error> for RoomError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(RoomErrorKind::StoreUnavailable(format!("Encoding error: {}", err)))
    }
}
