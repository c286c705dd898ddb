//! Lag element: unit-hydrograph convolution

use tracing::debug;

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};
use crate::parameters::{ParameterValue, Parameters};
use crate::state::{StateValue, States};
use crate::utils::constants::{DEFAULT_TIMESTEP, LAG_BUFFER, LAG_TIME, MAX_KERNEL_SUPPORT};

/// Shape of a unit-hydrograph kernel
///
/// Each shape is a cumulative area curve `F(x)` on timesteps, rising from 0
/// to 1; the weight of bin `i` is `F(i + 1) - F(i)`, so the weights always
/// sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelShape {
    /// `F(x) = (x / L)^d` on `[0, L]`
    PowerLaw { exponent: f64 },
    /// Two mirrored power laws: `F(x) = 0.5 (x / L)^d` on `[0, L]`,
    /// `1 - 0.5 (2 - x / L)^d` on `[L, 2L]`
    Symmetric { exponent: f64 },
    /// `F(x) = x / L` on `[0, L]`
    Uniform,
}

impl KernelShape {
    fn span(&self, lag: f64) -> f64 {
        match self {
            KernelShape::Symmetric { .. } => 2.0 * lag,
            KernelShape::PowerLaw { .. } | KernelShape::Uniform => lag,
        }
    }

    /// Number of bins covered for lag time `lag`, capped at
    /// [`MAX_KERNEL_SUPPORT`]
    pub fn support(&self, lag: f64) -> usize {
        let bins = self.span(lag).ceil().min(MAX_KERNEL_SUPPORT as f64);
        (bins as usize).max(1)
    }

    fn cumulative(&self, x: f64, lag: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        match *self {
            KernelShape::PowerLaw { exponent } => {
                if x < lag {
                    (x / lag).powf(exponent)
                } else {
                    1.0
                }
            }
            KernelShape::Uniform => (x / lag).min(1.0),
            KernelShape::Symmetric { exponent } => {
                if x <= lag {
                    0.5 * (x / lag).powf(exponent)
                } else if x < 2.0 * lag {
                    1.0 - 0.5 * (2.0 - x / lag).powf(exponent)
                } else {
                    1.0
                }
            }
        }
    }

    /// Kernel weights for lag time `lag`
    ///
    /// Fails on a lag time that is not finite and positive, on a kernel
    /// longer than [`MAX_KERNEL_SUPPORT`] bins, or on a non-positive exponent.
    pub fn weights(&self, lag: f64) -> std::result::Result<Vec<f64>, String> {
        if !lag.is_finite() || lag <= 0.0 {
            return Err(format!("lag time must be finite and positive, got {lag}"));
        }
        if let KernelShape::PowerLaw { exponent } | KernelShape::Symmetric { exponent } = *self {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(format!("kernel exponent must be positive, got {exponent}"));
            }
        }
        if self.span(lag).ceil() > MAX_KERNEL_SUPPORT as f64 {
            return Err(format!(
                "lag time {lag} needs more than {MAX_KERNEL_SUPPORT} kernel bins"
            ));
        }
        let n = self.support(lag);
        Ok((0..n)
            .map(|i| self.cumulative((i + 1) as f64, lag) - self.cumulative(i as f64, lag))
            .collect())
    }
}

/// Lag element
///
/// Convolves every flux of its input stream with the same kernel. Each
/// channel keeps a buffer of mass in transit: `buffer[k]` is the flux due
/// `k` timesteps from now. A step adds the weighted input to the buffer,
/// emits `buffer[0]` and shifts the buffer forward.
///
/// # Example
///
/// ```ignore
/// // 2.5 timestep lag on a single flux
/// let mut uh = LagElement::new("uh", KernelShape::PowerLaw { exponent: 2.5 }, 2.5, 1, None)?;
/// uh.set_input(vec![vec![vec![1.0, 0.0, 0.0, 0.0]]]);
/// let out = uh.get_output(true)?; // out[0][0] sums to 1
/// ```
#[derive(Debug, Clone)]
pub struct LagElement {
    id: String,
    shape: KernelShape,
    parameters: Parameters,
    num_channels: usize,
    weights: Vec<f64>,
    initial: Option<Vec<Vec<f64>>>,
    /// In-transit mass per channel
    buffers: Vec<Vec<f64>>,
    /// Buffer history of the current run, `history[0]` before the first step
    history: Vec<Vec<Vec<f64>>>,
    dt: f64,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl LagElement {
    /// Create a lag element over `num_channels` fluxes
    ///
    /// `initial = None` starts with empty buffers. Fails with
    /// `InvalidParameter` when `lag_time <= 0` or the initial buffers do not
    /// match the kernel.
    pub fn new(
        id: impl Into<String>,
        shape: KernelShape,
        lag_time: f64,
        num_channels: usize,
        initial: Option<Vec<Vec<f64>>>,
    ) -> Result<Self> {
        let id = id.into();
        let weights = shape
            .weights(lag_time)
            .map_err(|reason| SuperflexError::parameter(&id, LAG_TIME, reason))?;
        if num_channels == 0 {
            return Err(SuperflexError::parameter(&id, "channels", "at least one channel required"));
        }

        let mut element = Self {
            id,
            shape,
            parameters: Parameters::new().with(LAG_TIME, lag_time),
            num_channels,
            weights,
            initial: None,
            buffers: Vec::new(),
            history: Vec::new(),
            dt: DEFAULT_TIMESTEP,
            inputs: Vec::new(),
            cache: OutputCache::default(),
        };
        if let Some(buffers) = &initial {
            element.check_buffers(buffers)?;
        }
        element.initial = initial;
        element.buffers = element.initial_buffers();
        element.history.push(element.buffers.clone());
        Ok(element)
    }

    fn initial_buffers(&self) -> Vec<Vec<f64>> {
        self.initial
            .clone()
            .unwrap_or_else(|| vec![vec![0.0; self.weights.len()]; self.num_channels])
    }

    fn check_buffers(&self, buffers: &[Vec<f64>]) -> Result<()> {
        let n = self.weights.len();
        if buffers.len() != self.num_channels || buffers.iter().any(|b| b.len() != n) {
            return Err(SuperflexError::parameter(
                &self.id,
                LAG_BUFFER,
                format!("expected {} buffers of length {n}", self.num_channels),
            ));
        }
        if buffers.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SuperflexError::parameter(&self.id, LAG_BUFFER, "buffer not finite"));
        }
        Ok(())
    }

    pub fn shape(&self) -> KernelShape {
        self.shape
    }

    pub fn lag_time(&self) -> f64 {
        self.parameters.value(LAG_TIME, 0).unwrap_or(f64::NAN)
    }

    /// Current kernel weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Current in-transit buffers, one per channel
    pub fn buffers(&self) -> &[Vec<f64>] {
        &self.buffers
    }

    /// Buffer history of the current run
    pub fn state_array(&self) -> &[Vec<Vec<f64>>] {
        &self.history
    }

    /// Flux mass currently in transit
    pub fn resident_mass(&self) -> f64 {
        self.buffers.iter().flatten().sum::<f64>() * self.dt
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Replace the lag time and rebuild the kernel
    ///
    /// Buffers are resized to the new support. Mass beyond a shrunk support
    /// is released at the last remaining bin, so nothing in transit is lost.
    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        if name != LAG_TIME {
            return Err(SuperflexError::attribute(&self.id, name));
        }
        let ParameterValue::Scalar(lag_time) = value else {
            return Err(SuperflexError::parameter(&self.id, LAG_TIME, "lag time must be a scalar"));
        };
        let weights = self
            .shape
            .weights(lag_time)
            .map_err(|reason| SuperflexError::parameter(&self.id, LAG_TIME, reason))?;

        let n = weights.len();
        for buffer in &mut self.buffers {
            if n < buffer.len() {
                let overflow: f64 = buffer[n..].iter().sum();
                buffer.truncate(n);
                buffer[n - 1] += overflow;
            } else {
                buffer.resize(n, 0.0);
            }
        }
        if self.initial.as_ref().is_some_and(|b| b.iter().any(|c| c.len() != n)) {
            self.initial = None;
        }
        debug!(element = %self.id, lag_time, support = n, "lag kernel rebuilt");
        self.weights = weights;
        self.parameters.insert(LAG_TIME, lag_time);
        Ok(())
    }
}

impl Element for LagElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        match input_widths {
            [w] if *w == self.num_channels => Ok(vec![self.num_channels]),
            _ => Err(SuperflexError::InvalidTopology(format!(
                "lag element `{}` expects one stream of {} fluxes, got {:?}",
                self.id, self.num_channels, input_widths
            ))),
        }
    }

    fn set_timestep(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn begin_run(&mut self, len: usize) -> Result<()> {
        self.history.clear();
        self.history.reserve(len + 1);
        self.history.push(self.buffers.clone());
        self.cache.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let input = match inputs {
            [input] if input.len() == self.num_channels => input,
            _ => {
                return Err(SuperflexError::input(
                    &self.id,
                    format!("expected one stream of {} fluxes", self.num_channels),
                ))
            }
        };

        let mut out = Vec::with_capacity(self.num_channels);
        for (buffer, &x) in self.buffers.iter_mut().zip(input) {
            for (slot, w) in buffer.iter_mut().zip(&self.weights) {
                *slot += w * x;
            }
            out.push(buffer[0]);
            buffer.rotate_left(1);
            if let Some(last) = buffer.last_mut() {
                *last = 0.0;
            }
        }
        self.history.push(self.buffers.clone());

        let out = vec![out];
        self.cache.record(&out);
        Ok(out)
    }

    fn rollback(&mut self, steps: usize) {
        if steps + 1 >= self.history.len() {
            return;
        }
        self.history.truncate(steps + 1);
        self.buffers = self.history[steps].clone();
        debug!(element = %self.id, steps, "lag rolled back");
    }

    fn check_overrides(&self, overrides: Option<&States>) -> Result<()> {
        let Some(overrides) = overrides else {
            return Ok(());
        };
        match overrides.get(LAG_BUFFER) {
            Some(StateValue::Buffers(buffers)) => self.check_buffers(buffers)?,
            Some(StateValue::Scalar(_)) => {
                return Err(SuperflexError::parameter(
                    &self.id,
                    LAG_BUFFER,
                    "override must be one buffer per channel",
                ))
            }
            None => {}
        }
        if let Some(unknown) = overrides.keys().find(|k| k.as_str() != LAG_BUFFER) {
            return Err(SuperflexError::attribute(&self.id, unknown.as_str()));
        }
        Ok(())
    }

    fn reset_state(&mut self, overrides: Option<&States>) -> Result<()> {
        self.check_overrides(overrides)?;
        let buffers = match overrides.and_then(|o| o.get(LAG_BUFFER)) {
            Some(StateValue::Buffers(buffers)) => buffers.clone(),
            _ => self.initial_buffers(),
        };
        self.buffers = buffers;
        self.history.clear();
        self.history.push(self.buffers.clone());
        self.cache.clear();
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
        let mass = |buffers: &Vec<Vec<f64>>| buffers.iter().flatten().sum::<f64>();
        match (self.history.first(), self.history.last()) {
            (Some(first), Some(last)) => (mass(last) - mass(first)) * self.dt,
            _ => 0.0,
        }
    }

    fn is_stateful(&self) -> bool {
        true
    }
}
