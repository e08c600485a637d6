//! Room document model, codes, invariants and sanitization.

mod code;
mod invariants;
mod model;
mod sanitize;

pub use code::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode};
pub use invariants::{
    FinishedIsDecidedInvariant, HasCreatorInvariant, PlayingIsUndecidedInvariant, RoomInvariants,
    SeatsMatchStatusInvariant,
};
pub use model::{Room, RoomPatch, RoomStatus};
pub use sanitize::sanitize_room;
