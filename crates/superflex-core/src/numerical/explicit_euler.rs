//! Explicit (forward) Euler discretisation

use super::{clip, Advance, FluxBalance, NumericalApproximation};
use crate::error::RootFinderError;

/// Explicit forward Euler scheme
///
/// `S1 = S0 + dt * g(S0)`. No root finding; fluxes are those at the start
/// of the step. Conditionally stable, so large timesteps on fast stores
/// overshoot the bounds and get clipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEuler;

impl ExplicitEuler {
    pub fn new() -> Self {
        Self
    }
}

impl NumericalApproximation for ExplicitEuler {
    fn name(&self) -> &'static str {
        "ExplicitEuler"
    }

    fn advance(
        &self,
        fluxes: &mut dyn FnMut(f64) -> FluxBalance,
        s0: f64,
        dt: f64,
    ) -> Result<Advance, RootFinderError> {
        let at_start = fluxes(s0);
        let raw = s0 + dt * at_start.derivative();
        if !raw.is_finite() {
            return Err(RootFinderError::NonFinite { at: s0 });
        }
        let slack = f64::EPSILON * raw.abs().max(1.0);
        let (state, violation) = clip(raw, at_start.lower, at_start.upper, slack);
        Ok(Advance {
            state,
            fluxes: at_start,
            violation,
            iterations: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_forward_step() {
        let mut fluxes = |s: f64| FluxBalance {
            inflows: vec![1.0],
            outflows: vec![0.5 * s],
            losses: vec![],
            lower: 0.0,
            upper: f64::INFINITY,
        };
        let advance = ExplicitEuler.advance(&mut fluxes, 4.0, 1.0).unwrap();
        assert_abs_diff_eq!(advance.state, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(advance.fluxes.outflows[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overshoot_is_clipped() {
        let mut fluxes = |s: f64| FluxBalance {
            inflows: vec![],
            outflows: vec![3.0 * s],
            losses: vec![],
            lower: 0.0,
            upper: f64::INFINITY,
        };
        let advance = ExplicitEuler.advance(&mut fluxes, 1.0, 1.0).unwrap();
        assert_eq!(advance.state, 0.0);
        assert!(advance.violation.is_some());
    }
}
