//! Short room codes players read aloud and type in.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{RoomError, RoomErrorKind};

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Characters a room code is drawn from: uppercase letters and digits
/// without the easily confused `I`, `O`, `0` and `1`.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Validated room code; also the key of the room's document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input, trimming whitespace and uppercasing first.
    ///
    /// # Errors
    ///
    /// Returns [`RoomErrorKind::InvalidCode`] for a wrong length or a
    /// character outside [`ROOM_CODE_ALPHABET`].
    #[instrument]
    pub fn parse(input: &str) -> Result<Self, RoomError> {
        let value = input.trim().to_uppercase();
        let len = value.chars().count();
        if len != ROOM_CODE_LEN {
            return Err(RoomError::new(RoomErrorKind::InvalidCode(format!(
                "'{}' must be {} characters, got {}",
                input.trim(),
                ROOM_CODE_LEN,
                len
            ))));
        }
        if let Some((idx, ch)) = value
            .chars()
            .enumerate()
            .find(|(_, ch)| !ROOM_CODE_ALPHABET.contains(*ch))
        {
            return Err(RoomError::new(RoomErrorKind::InvalidCode(format!(
                "invalid character '{}' at position {}",
                ch, idx
            ))));
        }
        Ok(Self(value))
    }

    /// Draws a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let code = (0..ROOM_CODE_LEN)
            .filter_map(|_| alphabet.choose(&mut *rng).map(|b| *b as char))
            .collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse_uppercases_input() {
        let code = RoomCode::parse(" ab3d ").unwrap();
        assert_eq!(code.as_str(), "AB3D");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = RoomCode::parse("AB3").unwrap_err();
        assert!(matches!(err.kind(), RoomErrorKind::InvalidCode(_)));
    }

    #[test]
    fn test_parse_rejects_confusable_characters() {
        assert!(RoomCode::parse("AB0D").is_err());
        assert!(RoomCode::parse("ABID").is_err());
        assert!(RoomCode::parse("AB1O").is_err());
    }

    #[test]
    fn test_generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
        }
    }
}
