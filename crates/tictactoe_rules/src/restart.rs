//! Choosing who opens the next round after a finished game.

use rand::Rng;
use tracing::instrument;

use crate::types::Mark;

/// Mark that opens a round when nothing else decides it.
pub const DEFAULT_OPENER: Mark = Mark::X;

/// Rule for picking the opening mark of a restarted round.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StartRule {
    /// The previous winner opens; a draw falls back to [`DEFAULT_OPENER`].
    #[default]
    #[strum(to_string = "winner", serialize = "winnerstarts")]
    WinnerStarts,
    /// Either mark with equal probability.
    Random,
}

/// Picks the opening mark for the next round.
#[instrument(skip(rng))]
pub fn opening_mark<R: Rng + ?Sized>(rule: StartRule, prev_winner: Option<Mark>, rng: &mut R) -> Mark {
    match rule {
        StartRule::WinnerStarts => prev_winner.unwrap_or(DEFAULT_OPENER),
        StartRule::Random => {
            if rng.gen_bool(0.5) {
                Mark::O
            } else {
                Mark::X
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_winner_starts() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(opening_mark(StartRule::WinnerStarts, Some(Mark::O), &mut rng), Mark::O);
        assert_eq!(opening_mark(StartRule::WinnerStarts, Some(Mark::X), &mut rng), Mark::X);
    }

    #[test]
    fn test_draw_falls_back_to_default() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(opening_mark(StartRule::WinnerStarts, None, &mut rng), DEFAULT_OPENER);
    }

    #[test]
    fn test_random_produces_both_marks() {
        let mut rng = StdRng::seed_from_u64(42);
        let picks: Vec<Mark> = (0..64)
            .map(|_| opening_mark(StartRule::Random, Some(Mark::X), &mut rng))
            .collect();
        assert!(picks.contains(&Mark::X));
        assert!(picks.contains(&Mark::O));
    }

    #[test]
    fn test_rule_parses_from_text() {
        assert_eq!("winner".parse::<StartRule>(), Ok(StartRule::WinnerStarts));
        assert_eq!("Random".parse::<StartRule>(), Ok(StartRule::Random));
        assert!("coin".parse::<StartRule>().is_err());
    }
}
