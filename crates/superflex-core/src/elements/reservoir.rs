//! Reservoir element: a store governed by an ODE

use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};
use crate::numerical::{BoundsViolation, FluxBalance, NumericalApproximation};
use crate::parameters::{ParameterValue, Parameters};
use crate::state::{StateValue, States};
use crate::utils::constants::{DEFAULT_TIMESTEP, STORAGE};

/// Flux equations of a reservoir
///
/// A parameterisation of the generic store: it names its inputs and
/// parameters and evaluates the fluxes at a trial state. Parameter values are
/// passed resolved for the current timestep, in `parameter_names` order.
pub trait ReservoirFluxes: Send + Sync + Debug {
    /// Name of the parameterisation
    fn name(&self) -> &'static str;

    /// Width of the upstream stream
    fn num_inputs(&self) -> usize;

    /// Width of the downstream stream
    fn num_outputs(&self) -> usize;

    /// Parameter names, in the order `evaluate` receives them
    fn parameter_names(&self) -> &'static [&'static str];

    /// Reject out-of-domain parameter values: `Err((name, reason))`
    fn validate(&self, _params: &[f64]) -> std::result::Result<(), (&'static str, String)> {
        Ok(())
    }

    /// Initial storage when none is given
    fn default_state(&self, _params: &[f64]) -> f64 {
        0.0
    }

    /// Fluxes and admissible bounds at storage `state`
    fn evaluate(&self, state: f64, inputs: &[f64], params: &[f64]) -> FluxBalance;

    /// Downstream stream for a solved step
    ///
    /// Defaults to the outflows; stores that pass part of their input
    /// straight through override this.
    fn outputs(&self, balance: &FluxBalance, _inputs: &[f64]) -> Vec<f64> {
        balance.outflows.clone()
    }
}

/// Reservoir element
///
/// Each timestep runs the same cycle: resolve parameters, hand the flux
/// equations to the shared numerical approximation, then commit the new
/// storage and emit the downstream fluxes. A failed solve commits nothing
/// and reports the element and timestep.
///
/// # Example
///
/// ```ignore
/// let numerical = Arc::new(ImplicitEuler::default());
/// let mut store = ReservoirElement::new(
///     "fr",
///     PowerReservoir,
///     Parameters::new().with("k", 0.1).with("alpha", 1.0),
///     Some(10.0),
///     numerical,
/// )?;
/// store.set_input(vec![vec![precipitation]]);
/// let outflow = store.get_output(true)?;
/// ```
#[derive(Debug)]
pub struct ReservoirElement {
    id: String,
    fluxes: Box<dyn ReservoirFluxes>,
    numerical: Arc<dyn NumericalApproximation>,
    parameters: Parameters,
    initial: Option<f64>,
    /// Last committed storage
    state: f64,
    /// Storage history of the current run, `states[0]` before the first step
    states: Vec<f64>,
    dt: f64,
    inputs: SeriesStreams,
    cache: OutputCache,
    /// Mass lost at each step of the current run
    losses: Vec<f64>,
    violations: Vec<BoundsViolation>,
    scratch: Vec<f64>,
}

impl ReservoirElement {
    /// Create a reservoir
    ///
    /// `initial = None` takes the parameterisation's default storage.
    /// Fails with `InvalidParameter` on missing, non-finite or
    /// out-of-domain parameters.
    pub fn new(
        id: impl Into<String>,
        fluxes: impl ReservoirFluxes + 'static,
        parameters: Parameters,
        initial: Option<f64>,
        numerical: Arc<dyn NumericalApproximation>,
    ) -> Result<Self> {
        let id = id.into();
        let fluxes: Box<dyn ReservoirFluxes> = Box::new(fluxes);
        validate_parameters(&id, fluxes.as_ref(), &parameters)?;
        if let Some(s) = initial {
            if !s.is_finite() {
                return Err(SuperflexError::parameter(&id, STORAGE, "initial state not finite"));
            }
        }

        let mut element = Self {
            id,
            fluxes,
            numerical,
            parameters,
            initial,
            state: 0.0,
            states: Vec::new(),
            dt: DEFAULT_TIMESTEP,
            inputs: Vec::new(),
            cache: OutputCache::default(),
            losses: Vec::new(),
            violations: Vec::new(),
            scratch: Vec::new(),
        };
        element.state = element.initial_state();
        element.states.push(element.state);
        Ok(element)
    }

    fn initial_state(&self) -> f64 {
        self.initial.unwrap_or_else(|| {
            let mut params = Vec::new();
            self.parameters
                .resolve_into(self.fluxes.parameter_names(), 0, &mut params);
            self.fluxes.default_state(&params)
        })
    }

    /// Name of the flux parameterisation
    pub fn kind(&self) -> &'static str {
        self.fluxes.name()
    }

    /// Last committed storage
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Storage history of the current run, one longer than the run
    pub fn state_array(&self) -> &[f64] {
        &self.states
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    /// Replace a parameter between runs
    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        if !self.fluxes.parameter_names().contains(&name) {
            return Err(SuperflexError::attribute(&self.id, name));
        }
        let mut candidate = self.parameters.clone();
        candidate.insert(name, value);
        validate_parameters(&self.id, self.fluxes.as_ref(), &candidate)?;
        self.parameters = candidate;
        Ok(())
    }

    /// Bounds violations of the current run
    pub fn bounds_violations(&self) -> &[BoundsViolation] {
        &self.violations
    }

    pub fn numerical(&self) -> &Arc<dyn NumericalApproximation> {
        &self.numerical
    }
}

fn validate_parameters(id: &str, fluxes: &dyn ReservoirFluxes, parameters: &Parameters) -> Result<()> {
    let names = fluxes.parameter_names();
    parameters.require(id, names)?;
    let steps = parameters.series_len().unwrap_or(1);
    let mut params = Vec::with_capacity(names.len());
    for t in 0..steps {
        parameters.resolve_into(names, t, &mut params);
        fluxes
            .validate(&params)
            .map_err(|(name, reason)| SuperflexError::parameter(id, name, reason))?;
    }
    Ok(())
}

impl Element for ReservoirElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        match input_widths {
            [w] if *w == self.fluxes.num_inputs() => Ok(vec![self.fluxes.num_outputs()]),
            _ => Err(SuperflexError::InvalidTopology(format!(
                "reservoir `{}` expects one stream of {} fluxes, got {:?}",
                self.id,
                self.fluxes.num_inputs(),
                input_widths
            ))),
        }
    }

    fn set_timestep(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn begin_run(&mut self, len: usize) -> Result<()> {
        self.parameters.check_len(&self.id, len)?;
        self.states.clear();
        self.states.reserve(len + 1);
        self.states.push(self.state);
        self.cache.clear();
        self.losses.clear();
        self.violations.clear();
        debug!(element = %self.id, kind = self.fluxes.name(), start = self.state, len, "reservoir run");
        Ok(())
    }

    fn step(&mut self, t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let input = match inputs {
            [input] if input.len() == self.fluxes.num_inputs() => input,
            _ => {
                return Err(SuperflexError::input(
                    &self.id,
                    format!("expected one stream of {} fluxes", self.fluxes.num_inputs()),
                ))
            }
        };

        self.parameters
            .resolve_into(self.fluxes.parameter_names(), t, &mut self.scratch);
        let fluxes = self.fluxes.as_ref();
        let params = &self.scratch;
        let mut evaluate = |s: f64| fluxes.evaluate(s, input, params);

        let advance = self
            .numerical
            .advance(&mut evaluate, self.state, self.dt)
            .map_err(|source| SuperflexError::NonConvergence {
                element: self.id.clone(),
                timestep: t,
                source,
            })?;

        if let Some(mut violation) = advance.violation {
            violation.timestep = t;
            warn!(
                element = %self.id,
                timestep = t,
                value = violation.value,
                clipped = violation.clipped,
                "state outside bounds, clipped"
            );
            self.violations.push(violation);
        }

        self.state = advance.state;
        self.states.push(advance.state);
        self.losses.push(advance.fluxes.total_loss() * self.dt);

        let out = vec![self.fluxes.outputs(&advance.fluxes, input)];
        self.cache.record(&out);
        Ok(out)
    }

    fn rollback(&mut self, steps: usize) {
        if steps + 1 >= self.states.len() {
            return;
        }
        self.states.truncate(steps + 1);
        self.state = self.states[steps];
        self.losses.truncate(steps);
        self.violations.retain(|v| v.timestep < steps);
        debug!(element = %self.id, steps, state = self.state, "reservoir rolled back");
    }

    fn check_overrides(&self, overrides: Option<&States>) -> Result<()> {
        let Some(overrides) = overrides else {
            return Ok(());
        };
        match overrides.get(STORAGE) {
            Some(StateValue::Scalar(s)) if s.is_finite() => {}
            Some(_) => {
                return Err(SuperflexError::parameter(
                    &self.id,
                    STORAGE,
                    "override must be a finite scalar",
                ))
            }
            None => {}
        }
        if let Some(unknown) = overrides.keys().find(|k| k.as_str() != STORAGE) {
            return Err(SuperflexError::attribute(&self.id, unknown.as_str()));
        }
        Ok(())
    }

    fn reset_state(&mut self, overrides: Option<&States>) -> Result<()> {
        self.check_overrides(overrides)?;
        let state = match overrides.and_then(|o| o.get(STORAGE)) {
            Some(StateValue::Scalar(s)) => *s,
            _ => self.initial_state(),
        };
        self.state = state;
        self.states.clear();
        self.states.push(state);
        self.cache.clear();
        self.losses.clear();
        self.violations.clear();
        debug!(element = %self.id, state, "reservoir reset");
        Ok(())
    }

    fn abort_run(&mut self) {
        self.cache.clear();
    }

    fn inputs(&self) -> &[Vec<Vec<f64>>] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut SeriesStreams {
        &mut self.inputs
    }

    fn outputs(&self) -> &[Vec<Vec<f64>>] {
        self.cache.series()
    }

    fn storage_change(&self) -> f64 {
        match (self.states.first(), self.states.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    fn losses(&self) -> f64 {
        self.losses.iter().sum()
    }

    fn is_stateful(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PowerReservoir;
    use crate::numerical::{ExplicitEuler, ImplicitEuler};
    use crate::root_finder::Pegasus;
    use approx::assert_relative_eq;
    use superflex_types::RootFinderSettings;

    fn linear(k: f64, s0: f64) -> ReservoirElement {
        ReservoirElement::new(
            "fr",
            PowerReservoir,
            Parameters::new().with("k", k).with("alpha", 1.0),
            Some(s0),
            Arc::new(ImplicitEuler::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_implicit_linear_drainage() {
        // S1 = S0 / (1 + k dt)
        let mut store = linear(0.5, 10.0);
        store.set_input(vec![vec![vec![0.0, 0.0]]]);
        let out = store.get_output(true).unwrap();
        assert_relative_eq!(store.state_array()[1], 10.0 / 1.5, max_relative = 1e-8);
        assert_relative_eq!(store.state_array()[2], 10.0 / 2.25, max_relative = 1e-8);
        assert_relative_eq!(out[0][0][0], 0.5 * 10.0 / 1.5, max_relative = 1e-8);
        assert_relative_eq!(store.storage_change() + out[0][0].iter().sum::<f64>(), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_failed_solve_commits_nothing() {
        let settings = RootFinderSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let numerical = Arc::new(ImplicitEuler::new(Pegasus::with_settings(settings)));
        let params = Parameters::new().with("k", 0.5).with("alpha", 3.0);
        let mut store = ReservoirElement::new("fr", PowerReservoir, params, Some(10.0), numerical).unwrap();
        store.set_input(vec![vec![vec![0.0, 0.0]]]);

        let err = store.get_output(true).unwrap_err();
        match err {
            SuperflexError::NonConvergence { element, timestep, .. } => {
                assert_eq!(element, "fr");
                assert_eq!(timestep, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.state(), 10.0);
        assert_eq!(store.state_array(), &[10.0]);
        assert!(store.outputs().is_empty());
    }

    #[test]
    fn test_reset_restores_initial_or_override() {
        let mut store = linear(0.5, 10.0);
        store.set_input(vec![vec![vec![0.0; 3]]]);
        store.get_output(true).unwrap();
        assert!(store.state() < 10.0);

        store.reset_state(None).unwrap();
        assert_eq!(store.state_array(), &[10.0]);

        let overrides = States::from([(STORAGE.to_string(), StateValue::Scalar(4.0))]);
        store.reset_state(Some(&overrides)).unwrap();
        assert_eq!(store.state(), 4.0);

        let unknown = States::from([("S1".to_string(), StateValue::Scalar(4.0))]);
        assert!(store.reset_state(Some(&unknown)).is_err());
    }

    #[test]
    fn test_rollback_restores_earlier_step() {
        let mut store = linear(0.5, 10.0);
        store.set_input(vec![vec![vec![0.0; 3]]]);
        store.get_output(true).unwrap();
        let after_one = store.state_array()[1];

        store.rollback(1);
        assert_eq!(store.state(), after_one);
        assert_eq!(store.state_array(), &[10.0, after_one]);
        assert_relative_eq!(store.storage_change(), after_one - 10.0);

        // Steps beyond the history are a no-op
        store.rollback(5);
        assert_eq!(store.state_array().len(), 2);
        store.rollback(0);
        assert_eq!(store.state(), 10.0);
    }

    #[test]
    fn test_check_overrides_leaves_state_alone() {
        let mut store = linear(0.5, 10.0);
        store.set_input(vec![vec![vec![0.0; 2]]]);
        store.get_output(true).unwrap();
        let state = store.state();

        let buffers = States::from([(STORAGE.to_string(), StateValue::Buffers(vec![vec![1.0]]))]);
        assert!(matches!(
            store.check_overrides(Some(&buffers)),
            Err(SuperflexError::InvalidParameter { .. })
        ));
        let nan = States::from([(STORAGE.to_string(), StateValue::Scalar(f64::NAN))]);
        assert!(store.check_overrides(Some(&nan)).is_err());
        assert!(store.check_overrides(None).is_ok());
        assert_eq!(store.state(), state);
        assert_eq!(store.state_array().len(), 3);
    }

    #[test]
    fn test_set_parameter() {
        let mut store = linear(0.5, 10.0);
        assert!(matches!(
            store.set_parameter("x1", 1.0.into()),
            Err(SuperflexError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            store.set_parameter("k", (-1.0).into()),
            Err(SuperflexError::InvalidParameter { .. })
        ));
        assert_eq!(store.parameter("k"), Some(&ParameterValue::Scalar(0.5)));
        store.set_parameter("k", 0.25.into()).unwrap();
        assert_eq!(store.parameter("k"), Some(&ParameterValue::Scalar(0.25)));
    }

    #[test]
    fn test_series_parameter_length_checked() {
        let params = Parameters::new().with("k", vec![0.1, 0.2]).with("alpha", 1.0);
        let mut store =
            ReservoirElement::new("fr", PowerReservoir, params, Some(1.0), Arc::new(ImplicitEuler::default())).unwrap();
        store.set_input(vec![vec![vec![0.0; 3]]]);
        assert!(matches!(store.get_output(true), Err(SuperflexError::InvalidParameter { .. })));
        store.set_input(vec![vec![vec![0.0; 2]]]);
        assert!(store.get_output(true).is_ok());
    }

    #[test]
    fn test_explicit_overshoot_is_clipped() {
        let params = Parameters::new().with("k", 2.0).with("alpha", 1.0);
        let mut store =
            ReservoirElement::new("fr", PowerReservoir, params, Some(10.0), Arc::new(ExplicitEuler::new())).unwrap();
        store.set_input(vec![vec![vec![0.0]]]);
        store.get_output(true).unwrap();
        assert_eq!(store.state(), 0.0);
        let violation = store.bounds_violations()[0];
        assert_eq!(violation.timestep, 0);
        assert_relative_eq!(violation.value, -10.0);
    }

    #[test]
    fn test_default_state_from_parameters() {
        let store = ReservoirElement::new(
            "fr",
            PowerReservoir,
            Parameters::new().with("k", 0.5).with("alpha", 1.0),
            None,
            Arc::new(ImplicitEuler::default()),
        )
        .unwrap();
        assert_eq!(store.state(), 0.0);
        assert_eq!(store.kind(), "PowerReservoir");
    }
}
