//! Power-law drainage store

use crate::elements::ReservoirFluxes;
use crate::numerical::FluxBalance;

/// Store drained by a power law
///
/// ```text
/// dS/dt = P - k * S^alpha
/// ```
///
/// Inputs `[P]`, outputs `[Q]`, parameters `k >= 0` and `alpha > 0`.
/// Storage is bounded below by zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerReservoir;

impl ReservoirFluxes for PowerReservoir {
    fn name(&self) -> &'static str {
        "PowerReservoir"
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["k", "alpha"]
    }

    fn validate(&self, params: &[f64]) -> Result<(), (&'static str, String)> {
        let (k, alpha) = (params[0], params[1]);
        if k.is_nan() || k < 0.0 {
            return Err(("k", format!("must be non-negative, got {k}")));
        }
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(("alpha", format!("must be positive, got {alpha}")));
        }
        Ok(())
    }

    fn evaluate(&self, state: f64, inputs: &[f64], params: &[f64]) -> FluxBalance {
        let (k, alpha) = (params[0], params[1]);
        FluxBalance {
            inflows: vec![inputs[0]],
            outflows: vec![k * state.max(0.0).powf(alpha)],
            losses: Vec::new(),
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_outflow() {
        let balance = PowerReservoir.evaluate(4.0, &[1.0], &[0.5, 1.0]);
        assert_relative_eq!(balance.outflows[0], 2.0);
        assert_relative_eq!(balance.derivative(), -1.0);
    }

    #[test]
    fn test_negative_trial_state_is_finite() {
        let balance = PowerReservoir.evaluate(-1.0, &[0.0], &[0.5, 0.5]);
        assert!(balance.derivative().is_finite());
    }

    #[test]
    fn test_validate() {
        assert!(PowerReservoir.validate(&[-0.1, 1.0]).is_err());
        assert!(PowerReservoir.validate(&[0.1, 0.0]).is_err());
        assert!(PowerReservoir.validate(&[0.1, f64::NAN]).is_err());
        assert!(PowerReservoir.validate(&[0.0, 2.0]).is_ok());
    }
}
