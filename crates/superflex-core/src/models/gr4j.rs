//! GR4J expressed as a unit of generic elements
//!
//! ```text
//!  [P, E] -> ir (interception) -> pr (production store)
//!         -> spl (0.9 / 0.1)
//!         -> uh1 (power-law lag) | uh2 (symmetric lag)
//!         -> rr (routing store)  | tr (direct runoff)
//!         -> jun -> fa { Q, Qr, Qd }
//! ```
//!
//! The production store lets `Pn - Ps` bypass it, so its downstream flux is
//! the effective rainfall `Pn - Ps + Perc`.

use std::sync::Arc;

use crate::elements::{
    Filter, FluxAggregator, Junction, KernelShape, LagElement, ReservoirElement, ReservoirFluxes,
    Splitter, Transparent,
};
use crate::error::Result;
use crate::numerical::{FluxBalance, NumericalApproximation};
use crate::parameters::Parameters;
use crate::unit::Unit;

/// Production store exponent on relative filling
pub const ALPHA: f64 = 2.0;

/// Percolation exponent
pub const BETA: f64 = 5.0;

/// Percolation coefficient
pub const NU: f64 = 4.0 / 9.0;

/// Routing outflow exponent
pub const GAMMA: f64 = 5.0;

/// Exchange exponent
pub const OMEGA: f64 = 3.5;

/// Exponent of both unit-hydrograph S-curves
pub const UH_EXPONENT: f64 = 2.5;

/// Fraction of effective rainfall routed through the routing store
pub const SPLIT: f64 = 0.9;

/// Production store
///
/// Inputs `[Pn, En]`, output `[Pn - Ps + Perc]`, parameters
/// `x1, alpha, beta, ni`. Storage is bounded by `[0, x1]`.
///
/// ```text
/// Ps   = Pn (1 - (S/x1)^alpha)
/// Es   = En (2 S/x1 - (S/x1)^alpha)
/// Perc = x1^(1-beta) / (beta - 1) * ni^(beta-1) * S^beta
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionStore;

impl ProductionStore {
    /// Parameters with the standard GR4J constants
    pub fn parameters(x1: f64) -> Parameters {
        Parameters::new()
            .with("x1", x1)
            .with("alpha", ALPHA)
            .with("beta", BETA)
            .with("ni", NU)
    }
}

impl ReservoirFluxes for ProductionStore {
    fn name(&self) -> &'static str {
        "ProductionStore"
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["x1", "alpha", "beta", "ni"]
    }

    fn validate(&self, params: &[f64]) -> std::result::Result<(), (&'static str, String)> {
        let [x1, alpha, beta, ni] = [params[0], params[1], params[2], params[3]];
        if !x1.is_finite() || x1 <= 0.0 {
            return Err(("x1", format!("capacity must be positive, got {x1}")));
        }
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(("alpha", format!("must be positive, got {alpha}")));
        }
        if beta.is_nan() || beta <= 1.0 {
            return Err(("beta", format!("must exceed 1, got {beta}")));
        }
        if ni.is_nan() || ni <= 0.0 {
            return Err(("ni", format!("must be positive, got {ni}")));
        }
        Ok(())
    }

    fn default_state(&self, params: &[f64]) -> f64 {
        0.3 * params[0]
    }

    fn evaluate(&self, state: f64, inputs: &[f64], params: &[f64]) -> FluxBalance {
        let [x1, alpha, beta, ni] = [params[0], params[1], params[2], params[3]];
        let (pn, en) = (inputs[0], inputs[1]);
        let s = state.max(0.0);
        let filling = (s / x1).powf(alpha);

        let ps = pn * (1.0 - filling);
        let es = en * (2.0 * s / x1 - filling);
        let perc = x1.powf(1.0 - beta) / (beta - 1.0) * ni.powf(beta - 1.0) * s.powf(beta);

        FluxBalance {
            inflows: vec![ps],
            outflows: vec![perc],
            losses: vec![es],
            lower: 0.0,
            upper: x1,
        }
    }

    fn outputs(&self, balance: &FluxBalance, inputs: &[f64]) -> Vec<f64> {
        vec![inputs[0] - balance.inflows[0] + balance.outflows[0]]
    }
}

/// Routing store
///
/// Input `[Q9]`, output `[Qr]`, parameters `x2, x3, gamma, omega`.
/// Storage is bounded below by zero. The groundwater exchange `F` is a
/// gain when `x2 > 0`; it is reported as the loss `-F`.
///
/// ```text
/// Qr = x3^(1-gamma) / (gamma - 1) * S^gamma
/// F  = x2 (S/x3)^omega
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingStore;

impl RoutingStore {
    /// Parameters with the standard GR4J constants
    pub fn parameters(x2: f64, x3: f64) -> Parameters {
        Parameters::new()
            .with("x2", x2)
            .with("x3", x3)
            .with("gamma", GAMMA)
            .with("omega", OMEGA)
    }
}

impl ReservoirFluxes for RoutingStore {
    fn name(&self) -> &'static str {
        "RoutingStore"
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["x2", "x3", "gamma", "omega"]
    }

    fn validate(&self, params: &[f64]) -> std::result::Result<(), (&'static str, String)> {
        let [x2, x3, gamma, omega] = [params[0], params[1], params[2], params[3]];
        if !x2.is_finite() {
            return Err(("x2", format!("must be finite, got {x2}")));
        }
        if !x3.is_finite() || x3 <= 0.0 {
            return Err(("x3", format!("capacity must be positive, got {x3}")));
        }
        if gamma.is_nan() || gamma <= 1.0 {
            return Err(("gamma", format!("must exceed 1, got {gamma}")));
        }
        if omega.is_nan() || omega <= 0.0 {
            return Err(("omega", format!("must be positive, got {omega}")));
        }
        Ok(())
    }

    fn default_state(&self, params: &[f64]) -> f64 {
        0.5 * params[1]
    }

    fn evaluate(&self, state: f64, inputs: &[f64], params: &[f64]) -> FluxBalance {
        let [x2, x3, gamma, omega] = [params[0], params[1], params[2], params[3]];
        let s = state.max(0.0);
        let qr = x3.powf(1.0 - gamma) / (gamma - 1.0) * s.powf(gamma);
        let exchange = x2 * (s / x3).powf(omega);

        FluxBalance {
            inflows: vec![inputs[0]],
            outflows: vec![qr],
            losses: vec![-exchange],
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }
}

/// The four calibrated GR4J parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gr4jParameters {
    /// Production store capacity
    pub x1: f64,
    /// Groundwater exchange coefficient
    pub x2: f64,
    /// Routing store capacity
    pub x3: f64,
    /// Unit-hydrograph time base, in timesteps
    pub x4: f64,
}

/// Assemble a GR4J unit
///
/// The unit takes `[P, E]` and reports `{ Q, Qr, Qd }` from its aggregator.
/// Stores start at their default fillings; all reservoirs share
/// `numerical`.
pub fn build_unit(
    id: impl Into<String>,
    params: Gr4jParameters,
    numerical: Arc<dyn NumericalApproximation>,
) -> Result<Unit> {
    let production = ReservoirElement::new(
        "pr",
        ProductionStore,
        ProductionStore::parameters(params.x1),
        None,
        Arc::clone(&numerical),
    )?;
    let routing = ReservoirElement::new(
        "rr",
        RoutingStore,
        RoutingStore::parameters(params.x2, params.x3),
        None,
        numerical,
    )?;
    let uh1 = LagElement::new("uh1", KernelShape::PowerLaw { exponent: UH_EXPONENT }, params.x4, 1, None)?;
    let uh2 = LagElement::new("uh2", KernelShape::Symmetric { exponent: UH_EXPONENT }, params.x4, 1, None)?;
    let splitter = Splitter::new("spl", vec![vec![SPLIT], vec![1.0 - SPLIT]], None)?;
    let junction = Junction::new("jun", vec![vec![Some(0), None], vec![None, Some(0)]])?;
    let aggregator = FluxAggregator::new(
        "fa",
        vec![
            ("Q".to_string(), vec![0, 1]),
            ("Qr".to_string(), vec![0]),
            ("Qd".to_string(), vec![1]),
        ],
    )?;

    Unit::new(
        id,
        vec![
            vec![Filter::interception("ir").into()],
            vec![production.into()],
            vec![splitter.into()],
            vec![uh1.into(), uh2.into()],
            vec![routing.into(), Transparent::new("tr").into()],
            vec![junction.into()],
            vec![aggregator.into()],
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_production_store_at_capacity() {
        let params = [100.0, ALPHA, BETA, NU];
        let balance = ProductionStore.evaluate(100.0, &[5.0, 2.0], &params);
        // A full store takes no rain and evaporates at the potential rate
        assert_relative_eq!(balance.inflows[0], 0.0);
        assert_relative_eq!(balance.losses[0], 2.0);
        assert_eq!(ProductionStore.outputs(&balance, &[5.0, 2.0])[0], 5.0 + balance.outflows[0]);
    }

    #[test]
    fn test_percolation_matches_closed_form() {
        // Leading-order term of the GR4J percolation
        let x1 = 200.0;
        let s = 80.0;
        let balance = ProductionStore.evaluate(s, &[0.0, 0.0], &[x1, ALPHA, BETA, NU]);
        let expected = NU.powi(4) * s.powi(5) / (4.0 * x1.powi(4));
        assert_relative_eq!(balance.outflows[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_routing_exchange_is_negative_loss() {
        let balance = RoutingStore.evaluate(50.0, &[0.0], &[1.0, 50.0, GAMMA, OMEGA]);
        assert_relative_eq!(balance.losses[0], -1.0);
        assert_relative_eq!(balance.outflows[0], 50.0 / 4.0);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        assert!(ProductionStore.validate(&[0.0, ALPHA, BETA, NU]).is_err());
        assert!(RoutingStore.validate(&[0.0, -1.0, GAMMA, OMEGA]).is_err());
    }

    #[test]
    fn test_build_unit_layout() {
        let params = Gr4jParameters { x1: 300.0, x2: 0.5, x3: 80.0, x4: 1.7 };
        let unit = build_unit("gr4j", params, Arc::new(crate::numerical::ImplicitEuler::default())).unwrap();
        assert_eq!(unit.output_names(), Some(vec!["Q", "Qr", "Qd"]));
        assert_eq!(unit.layer_ids()[3], vec!["uh1", "uh2"]);
    }
}
