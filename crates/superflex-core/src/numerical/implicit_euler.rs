//! Implicit (backward) Euler discretisation

use super::{clip, Advance, FluxBalance, NumericalApproximation};
use crate::error::RootFinderError;
use crate::root_finder::{Pegasus, RootFinder};

/// Implicit backward Euler scheme
///
/// First-order, A-stable and L-stable. Fluxes are evaluated at the end of
/// the step, so the update closes the mass balance exactly (to the root
/// finder tolerance) whatever the timestep.
///
/// # Mathematical Form
/// ```text
/// r(S1) = S1 - S0 - dt * g(S1) = 0
/// ```
///
/// The root search starts from the admissible bounds reported by the
/// fluxes at `S0`. An unbounded upper side starts from `S0 + dt * inflow`.
/// A root outside the bounds is clipped and reported as a
/// [`BoundsViolation`](super::BoundsViolation).
#[derive(Debug)]
pub struct ImplicitEuler {
    root_finder: Box<dyn RootFinder>,
}

impl ImplicitEuler {
    /// Create an implicit Euler scheme closed with `root_finder`
    pub fn new(root_finder: impl RootFinder + 'static) -> Self {
        Self {
            root_finder: Box::new(root_finder),
        }
    }

    /// Root finder used for every step
    pub fn root_finder(&self) -> &dyn RootFinder {
        self.root_finder.as_ref()
    }
}

impl Default for ImplicitEuler {
    fn default() -> Self {
        Self::new(Pegasus::new())
    }
}

impl NumericalApproximation for ImplicitEuler {
    fn name(&self) -> &'static str {
        "ImplicitEuler"
    }

    fn advance(
        &self,
        fluxes: &mut dyn FnMut(f64) -> FluxBalance,
        s0: f64,
        dt: f64,
    ) -> Result<Advance, RootFinderError> {
        let at_start = fluxes(s0);
        let (lower, upper) = (at_start.lower, at_start.upper);

        let a = if lower.is_finite() { lower } else { s0 };
        let b = if upper.is_finite() {
            upper
        } else {
            (s0 + dt * at_start.total_inflow()).max(a)
        };

        let root = {
            let mut residual = |s: f64| s - s0 - dt * fluxes(s).derivative();
            self.root_finder.solve(&mut residual, a, b)?
        };

        let (state, violation) = clip(root.value, lower, upper, self.root_finder.settings().tol_x);
        Ok(Advance {
            state,
            fluxes: fluxes(state),
            violation,
            iterations: root.iterations,
        })
    }
}
