//! First-class invariants.
//!
//! Invariants are logical properties that must hold for every state a game
//! can legitimately reach. They are testable independently and let callers
//! verify a state before trusting or persisting it.

use crate::types::{Board, Mark};

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{}", description)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
///
/// Implementations are provided for tuples of two to four invariants.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set.
    ///
    /// Returns `Ok(())` if all invariants hold, or every violation otherwise.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

fn check<S, I: Invariant<S>>(state: &S, violations: &mut Vec<InvariantViolation>) {
    if !I::holds(state) {
        violations.push(InvariantViolation::new(I::description()));
    }
}

fn finish(violations: Vec<InvariantViolation>) -> Result<(), Vec<InvariantViolation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

impl<S, I1, I2> InvariantSet<S> for (I1, I2)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        check::<S, I1>(state, &mut violations);
        check::<S, I2>(state, &mut violations);
        finish(violations)
    }
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        check::<S, I1>(state, &mut violations);
        check::<S, I2>(state, &mut violations);
        check::<S, I3>(state, &mut violations);
        finish(violations)
    }
}

impl<S, I1, I2, I3, I4> InvariantSet<S> for (I1, I2, I3, I4)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
    I4: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        check::<S, I1>(state, &mut violations);
        check::<S, I2>(state, &mut violations);
        check::<S, I3>(state, &mut violations);
        check::<S, I4>(state, &mut violations);
        finish(violations)
    }
}

/// Invariant: mark counts never differ by more than one.
///
/// Holds for any board reached by alternating moves, whichever mark opened.
pub struct BalancedMarksInvariant;

impl Invariant<Board> for BalancedMarksInvariant {
    fn holds(board: &Board) -> bool {
        board.count(Mark::X).abs_diff(board.count(Mark::O)) <= 1
    }

    fn description() -> &'static str {
        "Mark counts differ by at most one"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Square, apply_move};

    struct AlwaysFails;

    impl Invariant<Board> for AlwaysFails {
        fn holds(_: &Board) -> bool {
            false
        }

        fn description() -> &'static str {
            "never holds"
        }
    }

    #[test]
    fn test_balanced_after_alternating_moves() {
        let board = apply_move(&Board::new(), 0, Mark::O).unwrap();
        let board = apply_move(&board, 4, Mark::X).unwrap();
        assert!(BalancedMarksInvariant::holds(&board));
    }

    #[test]
    fn test_unbalanced_board_detected() {
        let mut squares = [Square::Empty; 9];
        squares[0] = Square::Occupied(Mark::X);
        squares[1] = Square::Occupied(Mark::X);
        assert!(!BalancedMarksInvariant::holds(&Board::from_squares(squares)));
    }

    #[test]
    fn test_set_collects_every_violation() {
        type Pair = (BalancedMarksInvariant, AlwaysFails);
        let violations = Pair::check_all(&Board::new()).unwrap_err();
        assert_eq!(violations, vec![InvariantViolation::new("never holds")]);
    }
}
