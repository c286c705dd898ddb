//! Unit: a layered graph of elements driven timestep by timestep
//!
//! Elements live in one arena, stored layer after layer; a layer is a range
//! of the arena. Wiring between layers is positional: the output streams of
//! layer `i` are concatenated in element order and handed out to the
//! elements of layer `i + 1`, each taking as many streams as it has
//! upstream ports.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use rayon::prelude::*;
use superflex_types::RunSettings;
use tracing::{debug, info};

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::element_kind::ElementKind;
use crate::error::{Result, SuperflexError};
use crate::inspect::{Attribute, ElementCall, InternalValue};
use crate::numerical::BoundsViolation;
use crate::state::States;

/// Stable handle to an element of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Water balance of the last run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MassBalance {
    /// Net change of every reservoir storage and lag buffer
    pub storage_change: f64,
    /// Declared losses: evaporation, exchange, interception
    pub losses: f64,
}

impl MassBalance {
    /// `inflow - outflow - storage_change - losses`; zero when mass is conserved
    pub fn residual(&self, inflow: f64, outflow: f64) -> f64 {
        inflow - outflow - self.storage_change - self.losses
    }
}

/// Unit
///
/// Owns an ordered sequence of layers and runs them over one input stream.
///
/// # Example
///
/// ```ignore
/// let mut unit = Unit::new("model", vec![
///     vec![ReservoirElement::new("fr", PowerReservoir, params, Some(10.0), numerical)?.into()],
///     vec![LagElement::new("uh", KernelShape::Uniform, 3.0, 1, None)?.into()],
/// ])?;
/// unit.set_input(vec![precipitation])?;
/// let streams = unit.get_output(true)?;
/// ```
#[derive(Debug)]
pub struct Unit {
    id: String,
    elements: Vec<ElementKind>,
    layers: Vec<Range<usize>>,
    /// Upstream stream indices of each element within its layer's input
    wiring: Vec<Range<usize>>,
    index: HashMap<String, ElementId>,
    settings: RunSettings,
    inputs: Vec<Vec<f64>>,
    cache: OutputCache,
}

impl Unit {
    /// Assemble a unit from its layers
    ///
    /// Fails with `InvalidTopology` on an empty layer, a duplicated element
    /// identifier, a first layer that does not take exactly one stream, or
    /// adjacent layers whose stream counts differ.
    pub fn new(id: impl Into<String>, layers: Vec<Vec<ElementKind>>) -> Result<Self> {
        let id = id.into();
        if layers.is_empty() {
            return Err(SuperflexError::InvalidTopology(format!("unit `{id}` has no layers")));
        }

        let mut elements = Vec::new();
        let mut ranges = Vec::with_capacity(layers.len());
        let mut wiring = Vec::new();
        let mut index = HashMap::new();
        let mut available = 1;

        for (l, layer) in layers.into_iter().enumerate() {
            if layer.is_empty() {
                return Err(SuperflexError::InvalidTopology(format!(
                    "unit `{id}` layer {l} is empty"
                )));
            }
            let consumed: usize = layer.iter().map(Element::num_upstream).sum();
            if consumed != available {
                return Err(SuperflexError::InvalidTopology(format!(
                    "unit `{id}` layer {l} takes {consumed} streams, previous layer provides {available}"
                )));
            }

            let start = elements.len();
            let mut cursor = 0;
            available = 0;
            for element in layer {
                let handle = ElementId(elements.len());
                if index.insert(element.id().to_string(), handle).is_some() {
                    return Err(SuperflexError::InvalidTopology(format!(
                        "unit `{id}` has two elements named `{}`",
                        element.id()
                    )));
                }
                wiring.push(cursor..cursor + element.num_upstream());
                cursor += element.num_upstream();
                available += element.num_downstream();
                elements.push(element);
            }
            ranges.push(start..elements.len());
        }

        let mut unit = Self {
            id,
            elements,
            layers: ranges,
            wiring,
            index,
            settings: RunSettings::default(),
            inputs: Vec::new(),
            cache: OutputCache::default(),
        };
        unit.set_timestep(unit.settings.dt)?;
        debug!(unit = %unit.id, layers = unit.layers.len(), elements = unit.elements.len(), "unit assembled");
        Ok(unit)
    }

    /// Apply run settings
    pub fn with_settings(mut self, settings: RunSettings) -> Result<Self> {
        self.set_timestep(settings.dt)?;
        self.settings = settings;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Set the timestep duration of every element
    pub fn set_timestep(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SuperflexError::InvalidTimestep(dt));
        }
        self.settings.dt = dt;
        for element in &mut self.elements {
            element.set_timestep(dt);
        }
        Ok(())
    }

    /// Evaluate the elements of each layer on the rayon pool
    pub fn set_parallel(&mut self, parallel: bool) {
        self.settings.parallel_layers = parallel;
    }

    /// Set the input stream, one series per flux
    ///
    /// Fails with `InvalidInput` on empty, ragged or non-finite series, and
    /// with `InvalidTopology` when the flux widths do not fit the layers.
    pub fn set_input(&mut self, inputs: Vec<Vec<f64>>) -> Result<()> {
        let len = inputs.first().map_or(0, Vec::len);
        if len == 0 {
            return Err(SuperflexError::input(&self.id, "empty input"));
        }
        if inputs.iter().any(|series| series.len() != len) {
            return Err(SuperflexError::input(&self.id, "input series differ in length"));
        }
        if let Some((k, t)) = inputs.iter().enumerate().find_map(|(k, series)| {
            series.iter().position(|v| !v.is_finite()).map(|t| (k, t))
        }) {
            return Err(SuperflexError::input(
                &self.id,
                format!("input flux {k} not finite at timestep {t}"),
            ));
        }
        self.output_widths(inputs.len())?;
        self.inputs = inputs;
        Ok(())
    }

    /// Stream widths after each layer, given the input width
    fn output_widths(&self, input_width: usize) -> Result<Vec<usize>> {
        let mut widths = vec![input_width];
        for layer in &self.layers {
            let mut next = Vec::new();
            for (element, wires) in self.elements[layer.clone()].iter().zip(&self.wiring[layer.clone()]) {
                next.extend(element.output_widths(&widths[wires.clone()])?);
            }
            widths = next;
        }
        Ok(widths)
    }

    /// Outputs of the last layer, `[stream][flux][t]`
    ///
    /// `solve = false` returns the outputs of the last run. `solve = true`
    /// runs the stored input from the current states. When an element fails
    /// at timestep `t`, every element is rolled back to the end of `t - 1`,
    /// so upstream layers never keep a step the unit did not finish.
    pub fn get_output(&mut self, solve: bool) -> Result<SeriesStreams> {
        if solve {
            if let Err(err) = self.run() {
                for element in &mut self.elements {
                    element.abort_run();
                }
                self.cache.clear();
                debug!(unit = %self.id, error = %err, "unit run aborted");
                return Err(err);
            }
        }
        Ok(self.cache.series().to_vec())
    }

    fn run(&mut self) -> Result<()> {
        let len = self.inputs.first().map_or(0, Vec::len);
        if len == 0 {
            return Err(SuperflexError::input(&self.id, "no input set"));
        }

        for element in &mut self.elements {
            element.begin_run(len)?;
        }
        self.cache.clear();
        debug!(unit = %self.id, len, parallel = self.settings.parallel_layers, "unit run");

        for t in 0..len {
            let mut streams: Streams = vec![self.inputs.iter().map(|series| series[t]).collect()];
            for layer in 0..self.layers.len() {
                match self.step_layer(layer, t, &streams) {
                    Ok(next) => streams = next,
                    Err(err) => {
                        self.rollback(t);
                        return Err(err);
                    }
                }
            }
            self.cache.record(&streams);
        }

        let balance = self.mass_balance();
        info!(
            unit = %self.id,
            timesteps = len,
            storage_change = balance.storage_change,
            losses = balance.losses,
            violations = self.bounds_violations().len(),
            "unit run complete"
        );
        Ok(())
    }

    /// Restore every element to its state after `steps` timesteps
    fn rollback(&mut self, steps: usize) {
        for element in &mut self.elements {
            element.rollback(steps);
        }
        debug!(unit = %self.id, steps, "unit rolled back");
    }

    fn step_layer(&mut self, layer: usize, t: usize, inputs: &Streams) -> Result<Streams> {
        let range = self.layers[layer].clone();
        let elements = &mut self.elements[range.clone()];
        let wiring = &self.wiring[range];

        if self.settings.parallel_layers && elements.len() > 1 {
            let outputs = elements
                .par_iter_mut()
                .zip(wiring.par_iter())
                .map(|(element, wires)| element.step(t, &inputs[wires.clone()]))
                .collect::<Result<Vec<_>>>()?;
            Ok(outputs.into_iter().flatten().collect())
        } else {
            let mut next = Vec::new();
            for (element, wires) in elements.iter_mut().zip(wiring) {
                next.extend(element.step(t, &inputs[wires.clone()])?);
            }
            Ok(next)
        }
    }

    /// Reset every element, with optional per-element overrides
    ///
    /// Overrides are keyed by element identifier. Every override is checked
    /// before anything is reset: an unknown identifier fails with
    /// `UnknownElement`, an invalid value with the element's own error, and
    /// in both cases no element changes.
    pub fn reset_state(&mut self, overrides: Option<&BTreeMap<String, States>>) -> Result<()> {
        if let Some(unknown) = overrides.and_then(|o| o.keys().find(|id| !self.index.contains_key(*id))) {
            return Err(SuperflexError::UnknownElement(unknown.clone()));
        }
        for element in &self.elements {
            element.check_overrides(overrides.and_then(|o| o.get(element.id())))?;
        }
        for element in &mut self.elements {
            let states = overrides.and_then(|o| o.get(element.id()));
            element.reset_state(states)?;
        }
        self.cache.clear();
        debug!(unit = %self.id, "unit reset");
        Ok(())
    }

    /// Handle of the element named `id`
    pub fn handle(&self, id: &str) -> Option<ElementId> {
        self.index.get(id).copied()
    }

    pub fn element(&self, id: &str) -> Result<&ElementKind> {
        let handle = self
            .handle(id)
            .ok_or_else(|| SuperflexError::UnknownElement(id.to_string()))?;
        Ok(&self.elements[handle.0])
    }

    pub fn element_mut(&mut self, id: &str) -> Result<&mut ElementKind> {
        let handle = self
            .handle(id)
            .ok_or_else(|| SuperflexError::UnknownElement(id.to_string()))?;
        Ok(&mut self.elements[handle.0])
    }

    /// Element identifiers, layer by layer
    pub fn layer_ids(&self) -> Vec<Vec<&str>> {
        self.layers
            .iter()
            .map(|layer| self.elements[layer.clone()].iter().map(Element::id).collect())
            .collect()
    }

    /// Read an attribute of an element without solving
    pub fn get_internal(&self, id: &str, attribute: &Attribute) -> Result<InternalValue> {
        self.element(id)?.get_internal(attribute)
    }

    /// Invoke an operation on an element
    ///
    /// `GetOutput { solve: true }` re-runs the whole unit, since an element
    /// inside it only sees its inputs through the layers above.
    pub fn call_internal(&mut self, id: &str, call: ElementCall) -> Result<Option<InternalValue>> {
        match call {
            ElementCall::GetOutput { solve: true } => {
                self.element(id)?;
                self.get_output(true)?;
                self.call_internal(id, ElementCall::GetOutput { solve: false })
            }
            call => self.element_mut(id)?.call_internal(call),
        }
    }

    /// Water balance of the last run
    pub fn mass_balance(&self) -> MassBalance {
        self.elements.iter().fold(MassBalance::default(), |acc, element| MassBalance {
            storage_change: acc.storage_change + element.storage_change(),
            losses: acc.losses + element.losses(),
        })
    }

    /// Bounds violations of the last run, with the element that raised each
    pub fn bounds_violations(&self) -> Vec<(&str, &BoundsViolation)> {
        self.elements
            .iter()
            .filter_map(ElementKind::as_reservoir)
            .flat_map(|r| r.bounds_violations().iter().map(move |v| (r.id(), v)))
            .collect()
    }

    /// Output names when the last layer is a single aggregator
    pub fn output_names(&self) -> Option<Vec<&str>> {
        let last = self.layers.last()?;
        match &self.elements[last.clone()] {
            [ElementKind::Aggregator(fa)] => Some(fa.names().collect()),
            _ => None,
        }
    }
}
