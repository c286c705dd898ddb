//! Time discretisation of reservoir mass balances
//!
//! A reservoir describes its mass balance `dS/dt = g(S)` through a
//! [`FluxBalance`]; a [`NumericalApproximation`] turns that into a new state
//! for one timestep:
//! - [`ImplicitEuler`]: `S1 = S0 + dt * g(S1)`, closed with a root finder
//! - [`ExplicitEuler`]: `S1 = S0 + dt * g(S0)`

mod explicit_euler;
mod implicit_euler;

pub use explicit_euler::ExplicitEuler;
pub use implicit_euler::ImplicitEuler;

use std::fmt::Debug;
use std::sync::Arc;

use superflex_types::{NumericalSettings, RootFinderKind, Scheme};

use crate::error::RootFinderError;
use crate::root_finder::{Newton, Pegasus};

/// Fluxes of a reservoir evaluated at one state
///
/// All fluxes are rates (mass per unit time). Inflows add to storage,
/// outflows and losses drain it; outflows are routed downstream while
/// losses leave the model (evapotranspiration, exchange).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxBalance {
    pub inflows: Vec<f64>,
    pub outflows: Vec<f64>,
    pub losses: Vec<f64>,
    /// Lowest admissible state
    pub lower: f64,
    /// Highest admissible state (may be infinite)
    pub upper: f64,
}

impl FluxBalance {
    /// Net rate of change of storage
    pub fn derivative(&self) -> f64 {
        self.inflows.iter().sum::<f64>()
            - self.outflows.iter().sum::<f64>()
            - self.losses.iter().sum::<f64>()
    }

    /// Total inflow rate
    pub fn total_inflow(&self) -> f64 {
        self.inflows.iter().sum()
    }

    /// Total loss rate
    pub fn total_loss(&self) -> f64 {
        self.losses.iter().sum()
    }
}

/// A solved state that fell outside the admissible range and was clipped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsViolation {
    /// Timestep index within the run
    pub timestep: usize,
    /// State returned by the solver
    pub value: f64,
    /// State committed after clipping
    pub clipped: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Outcome of advancing one reservoir by one timestep
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// New state, inside the bounds
    pub state: f64,
    /// Fluxes consistent with the scheme for this step
    pub fluxes: FluxBalance,
    /// Set when the raw solution had to be clipped; `timestep` is left at 0
    pub violation: Option<BoundsViolation>,
    /// Root-finder iterations spent
    pub iterations: usize,
}

/// Time discretisation shared by reservoirs
///
/// Implementations are stateless strategies: one instance is shared behind
/// an [`Arc`] by every reservoir that uses it.
pub trait NumericalApproximation: Send + Sync + Debug {
    /// Scheme name, for diagnostics
    fn name(&self) -> &'static str;

    /// Advance the state `s0` by `dt`
    ///
    /// `fluxes` evaluates the reservoir fluxes and bounds at a trial state.
    fn advance(
        &self,
        fluxes: &mut dyn FnMut(f64) -> FluxBalance,
        s0: f64,
        dt: f64,
    ) -> Result<Advance, RootFinderError>;
}

/// Clip `value` into `[lower, upper]`, reporting excursions beyond `slack`
pub(crate) fn clip(value: f64, lower: f64, upper: f64, slack: f64) -> (f64, Option<BoundsViolation>) {
    let clipped = value.max(lower).min(upper);
    let violation = if (clipped - value).abs() > slack {
        Some(BoundsViolation {
            timestep: 0,
            value,
            clipped,
            lower,
            upper,
        })
    } else {
        None
    };
    (clipped, violation)
}

/// Build the numerical approximation described by `settings`
pub fn from_settings(settings: &NumericalSettings) -> Arc<dyn NumericalApproximation> {
    match settings.scheme {
        Scheme::ExplicitEuler => Arc::new(ExplicitEuler::new()),
        Scheme::ImplicitEuler => match settings.root_finder {
            RootFinderKind::Pegasus => Arc::new(ImplicitEuler::new(Pegasus::with_settings(
                settings.root_finder_settings,
            ))),
            RootFinderKind::Newton => Arc::new(ImplicitEuler::new(Newton::with_settings(
                settings.root_finder_settings,
            ))),
        },
    }
}
