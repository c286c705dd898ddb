//! Scalar root finders
//!
//! Provides bracketing solvers for `f(x) = 0`, used to close implicit
//! timestep updates:
//! - Pegasus (bracketing secant, derivative free)
//! - Newton (finite-difference derivative, safeguarded by the bracket)

mod newton;
mod pegasus;

pub use newton::Newton;
pub use pegasus::Pegasus;

use std::fmt::Debug;

use superflex_types::RootFinderSettings;

use crate::error::RootFinderError;
use crate::utils::constants::{BRACKET_GROWTH, BRACKET_SEED_WIDTH};

/// A converged root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    /// Location of the root
    pub value: f64,
    /// Residual at `value`
    pub residual: f64,
    /// Iterations spent after bracketing
    pub iterations: usize,
}

/// Scalar root-finder trait
///
/// Implementations hold only settings: a single instance can be shared by
/// every reservoir of a unit.
pub trait RootFinder: Send + Sync + Debug {
    /// Settings used by every solve
    fn settings(&self) -> &RootFinderSettings;

    /// Find `x` with `f(x) = 0`, starting from the guesses `a` and `b`
    ///
    /// The guesses do not have to bracket a root: the bracket is expanded
    /// outward until the residual changes sign.
    fn solve(&self, f: &mut dyn FnMut(f64) -> f64, a: f64, b: f64) -> Result<Root, RootFinderError>;
}

/// Two points with residuals of opposite sign (or one exact root)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    pub a: f64,
    pub fa: f64,
    pub b: f64,
    pub fb: f64,
}

fn evaluate(f: &mut dyn FnMut(f64) -> f64, x: f64) -> Result<f64, RootFinderError> {
    let y = f(x);
    if y.is_finite() {
        Ok(y)
    } else {
        Err(RootFinderError::NonFinite { at: x })
    }
}

/// Expand `[a, b]` outward until `f` changes sign
///
/// The endpoint with the smaller residual moves, so the search heads
/// towards the root. Fails after `max_expansions` moves.
pub(crate) fn expand_bracket(
    f: &mut dyn FnMut(f64) -> f64,
    a: f64,
    b: f64,
    max_expansions: usize,
) -> Result<Bracket, RootFinderError> {
    let (mut a, mut b) = if a <= b { (a, b) } else { (b, a) };
    if !a.is_finite() {
        return Err(RootFinderError::NonFinite { at: a });
    }
    if !b.is_finite() {
        return Err(RootFinderError::NonFinite { at: b });
    }

    let mut fa = evaluate(f, a)?;
    if fa == 0.0 {
        return Ok(Bracket { a, fa, b: a, fb: fa });
    }
    if a == b {
        b = a + a.abs().max(1.0) * BRACKET_SEED_WIDTH;
    }
    let mut fb = evaluate(f, b)?;

    for _ in 0..max_expansions {
        if fa * fb <= 0.0 {
            return Ok(Bracket { a, fa, b, fb });
        }
        if fa.abs() < fb.abs() {
            a += BRACKET_GROWTH * (a - b);
            fa = evaluate(f, a)?;
        } else {
            b += BRACKET_GROWTH * (b - a);
            fb = evaluate(f, b)?;
        }
    }

    if fa * fb <= 0.0 {
        Ok(Bracket { a, fa, b, fb })
    } else {
        Err(RootFinderError::NoBracket {
            expansions: max_expansions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_already_valid() {
        let mut f = |x: f64| x - 1.0;
        let bracket = expand_bracket(&mut f, 0.0, 2.0, 10).unwrap();
        assert_eq!((bracket.a, bracket.b), (0.0, 2.0));
        assert!(bracket.fa * bracket.fb < 0.0);
    }

    #[test]
    fn test_bracket_expands_upward() {
        let mut f = |x: f64| x - 10.0;
        let bracket = expand_bracket(&mut f, 0.0, 1.0, 20).unwrap();
        assert!(bracket.a <= 10.0 && bracket.b >= 10.0);
    }

    #[test]
    fn test_bracket_expands_downward() {
        let mut f = |x: f64| x + 5.0;
        let bracket = expand_bracket(&mut f, 0.0, 1.0, 20).unwrap();
        assert!(bracket.a <= -5.0);
    }

    #[test]
    fn test_bracket_swapped_guesses() {
        let mut f = |x: f64| x - 0.5;
        let bracket = expand_bracket(&mut f, 1.0, 0.0, 10).unwrap();
        assert!(bracket.a < bracket.b);
    }

    #[test]
    fn test_bracket_coincident_guesses() {
        let mut f = |x: f64| x - 3.0;
        let bracket = expand_bracket(&mut f, 2.0, 2.0, 20).unwrap();
        assert!(bracket.fa * bracket.fb <= 0.0);
    }

    #[test]
    fn test_bracket_fails_without_sign_change() {
        let mut f = |x: f64| x * x + 1.0;
        let err = expand_bracket(&mut f, -1.0, 1.0, 8).unwrap_err();
        assert_eq!(err, RootFinderError::NoBracket { expansions: 8 });
    }

    #[test]
    fn test_bracket_rejects_nan() {
        let mut f = |_x: f64| f64::NAN;
        let err = expand_bracket(&mut f, 0.0, 1.0, 8).unwrap_err();
        assert!(matches!(err, RootFinderError::NonFinite { .. }));
    }
}
