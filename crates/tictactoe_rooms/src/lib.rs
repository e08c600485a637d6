//! Two-player tic-tac-toe rooms shared through an eventually-consistent
//! key-value store.
//!
//! # Architecture
//!
//! - **Room**: the shared document, its code, invariants and sanitization
//! - **Store**: typed adapter over a raw JSON backend, with optimistic
//!   transactions
//! - **Lifecycle**: create, join, move, restart and leave transitions
//! - **Sync**: per-room polling loop
//! - **Session**: one participant's local state machine, driven by
//!   [`RoomClient`]
//!
//! # Example
//!
//! ```
//! use tictactoe_rooms::{MoveCommit, RoomCode, RoomManager, RoomStatus, RoomStore};
//!
//! # async fn example() -> Result<(), tictactoe_rooms::RoomError> {
//! let (store, _backend) = RoomStore::in_memory();
//! let manager = RoomManager::new(store, MoveCommit::Overwrite, 8);
//!
//! let code = RoomCode::parse("ab3d")?;
//! manager.create(&code, "p1", "Alice", true).await?;
//! let room = manager.join(&code, "p2", "Bob").await?;
//! assert_eq!(room.status, RoomStatus::Playing);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod lifecycle;
mod room;
mod session;
mod store;
mod sync;

// Crate-level exports - Errors
pub use error::{RoomError, RoomErrorKind};

// Crate-level exports - Configuration
pub use config::{AUTH_TOKEN_ENV, ConfigError, DATABASE_URL_ENV, RoomsConfig};

// Crate-level exports - Room model
pub use room::{
    FinishedIsDecidedInvariant, HasCreatorInvariant, PlayingIsUndecidedInvariant, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN, Room, RoomCode, RoomInvariants, RoomPatch, RoomStatus, SeatsMatchStatusInvariant,
    sanitize_room,
};

// Crate-level exports - Store
pub use store::{
    CasOutcome, DEFAULT_MAX_ATTEMPTS, FirebaseBackend, MemoryBackend, RoomBackend, RoomStore, Version,
    Versioned,
};

// Crate-level exports - Lifecycle
pub use lifecycle::{DEFAULT_MAX_CODE_ATTEMPTS, MoveCommit, RoomManager};

// Crate-level exports - Sync
pub use sync::{DEFAULT_SYNC_INTERVAL, SyncEvent, SyncHandle, SyncLoop};

// Crate-level exports - Session
pub use client::RoomClient;
pub use session::{Command, Mutation, Phase, Rejection, Seat, Session, SessionUpdate};

// Crate-level exports - Rules engine
pub use tictactoe_rules::{Board, Mark, Outcome, Position, StartRule};
