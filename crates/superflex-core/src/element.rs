//! Core Element trait
//!
//! Every element consumes `num_upstream` flux streams and produces
//! `num_downstream` flux streams. A stream is a vector of named-by-position
//! fluxes; over a run each flux becomes a time series.

use crate::error::{Result, SuperflexError};
use crate::state::States;

/// Per-timestep streams: `[stream][flux]`
pub type Streams = Vec<Vec<f64>>;

/// Time series streams: `[stream][flux][timestep]`
pub type SeriesStreams = Vec<Vec<Vec<f64>>>;

/// Core element trait
///
/// # Design
///
/// - One uniform `step` advances the element by one timestep
/// - Elements that hold state commit it only when a step succeeds
/// - Outputs of the last run are cached and readable without recomputation
pub trait Element {
    /// Stable identifier, unique within a unit
    fn id(&self) -> &str;

    /// Number of upstream streams consumed
    fn num_upstream(&self) -> usize {
        1
    }

    /// Number of downstream streams produced
    fn num_downstream(&self) -> usize {
        1
    }

    /// Validate upstream stream widths and report downstream widths
    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>>;

    /// Set the timestep duration
    fn set_timestep(&mut self, _dt: f64) {}

    /// Prepare a run of `len` timesteps
    fn begin_run(&mut self, len: usize) -> Result<()>;

    /// Advance one timestep
    fn step(&mut self, t: usize, inputs: &[Vec<f64>]) -> Result<Streams>;

    /// Discard the partial outputs of a failed run
    ///
    /// Committed state is kept.
    fn abort_run(&mut self);

    /// Roll state back to the end of timestep `steps - 1` of the current run
    ///
    /// `rollback(0)` restores the state the run started from. Steps not yet
    /// taken are left alone.
    fn rollback(&mut self, _steps: usize) {}

    /// Check state overrides without applying them
    fn check_overrides(&self, _overrides: Option<&States>) -> Result<()> {
        Ok(())
    }

    /// Reset state to its initial value, or to the given overrides
    fn reset_state(&mut self, _overrides: Option<&States>) -> Result<()> {
        Ok(())
    }

    /// Stored input series for standalone runs
    fn inputs(&self) -> &[Vec<Vec<f64>>];

    /// Mutable access to stored input series
    fn inputs_mut(&mut self) -> &mut SeriesStreams;

    /// Outputs cached by the last run
    fn outputs(&self) -> &[Vec<Vec<f64>>];

    /// Net storage change over the last run, time-integrated
    fn storage_change(&self) -> f64 {
        0.0
    }

    /// Mass removed by declared losses over the last run
    fn losses(&self) -> f64 {
        0.0
    }

    /// Returns true if this element carries state across timesteps
    fn is_stateful(&self) -> bool {
        false
    }

    /// Store input series for a standalone run
    fn set_input(&mut self, input: SeriesStreams) {
        *self.inputs_mut() = input;
    }

    /// Outputs for the stored input
    ///
    /// `solve = false` returns the cached outputs of the last run without
    /// recomputation. `solve = true` runs the stored input from the current
    /// state.
    fn get_output(&mut self, solve: bool) -> Result<SeriesStreams> {
        if solve {
            let inputs = std::mem::take(self.inputs_mut());
            let result = run_series(self, &inputs);
            *self.inputs_mut() = inputs;
            if let Err(err) = result {
                self.abort_run();
                return Err(err);
            }
        }
        Ok(self.outputs().to_vec())
    }
}

/// Common length of every series in `inputs`
pub(crate) fn series_len(element: &str, inputs: &[Vec<Vec<f64>>]) -> Result<usize> {
    let mut lengths = inputs.iter().flatten().map(Vec::len);
    let Some(len) = lengths.next() else {
        return Err(SuperflexError::input(element, "no input series"));
    };
    if lengths.any(|l| l != len) {
        return Err(SuperflexError::input(element, "input series differ in length"));
    }
    Ok(len)
}

/// Drive `element` over whole input series, one timestep at a time
pub(crate) fn run_series<E: Element + ?Sized>(element: &mut E, inputs: &[Vec<Vec<f64>>]) -> Result<()> {
    if inputs.len() != element.num_upstream() {
        return Err(SuperflexError::input(
            element.id(),
            format!(
                "expected {} upstream streams, got {}",
                element.num_upstream(),
                inputs.len()
            ),
        ));
    }
    let len = series_len(element.id(), inputs)?;
    let widths: Vec<usize> = inputs.iter().map(Vec::len).collect();
    element.output_widths(&widths)?;

    element.begin_run(len)?;
    let mut step_inputs: Streams = widths.iter().map(|w| vec![0.0; *w]).collect();
    for t in 0..len {
        for (stream, series) in step_inputs.iter_mut().zip(inputs) {
            for (value, flux) in stream.iter_mut().zip(series) {
                *value = flux[t];
            }
        }
        element.step(t, &step_inputs)?;
    }
    Ok(())
}

/// Output series recorded timestep by timestep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputCache {
    series: SeriesStreams,
}

impl OutputCache {
    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Append one timestep of output
    pub fn record(&mut self, step: &[Vec<f64>]) {
        if self.series.is_empty() {
            self.series = step.iter().map(|s| vec![Vec::new(); s.len()]).collect();
        }
        for (stream, values) in self.series.iter_mut().zip(step) {
            for (flux, value) in stream.iter_mut().zip(values) {
                flux.push(*value);
            }
        }
    }

    pub fn series(&self) -> &[Vec<Vec<f64>>] {
        &self.series
    }
}
