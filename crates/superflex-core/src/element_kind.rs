//! ElementKind enum for match dispatch over the closed set of elements
//!
//! A unit stores its elements in one arena of `ElementKind`, so every
//! element of a layer is reachable by index and dispatch is a `match`
//! rather than a vtable call.

use crate::element::{Element, SeriesStreams, Streams};
use crate::elements::{
    Filter, FluxAggregator, Junction, LagElement, ReservoirElement, Splitter, Transparent,
};
use crate::error::{Result, SuperflexError};
use crate::inspect::{Attribute, ElementCall, InternalValue};
use crate::state::States;
use crate::utils::constants::{LAG_BUFFER, STORAGE};

macro_rules! dispatch_structural {
    ($self:ident, $method:ident, $($args:expr),*) => {
        match $self {
            StructuralElement::Splitter(e) => e.$method($($args),*),
            StructuralElement::Junction(e) => e.$method($($args),*),
            StructuralElement::Transparent(e) => e.$method($($args),*),
            StructuralElement::Filter(e) => e.$method($($args),*),
        }
    };
}

macro_rules! dispatch_element {
    ($self:ident, $method:ident, $($args:expr),*) => {
        match $self {
            ElementKind::Reservoir(e) => e.$method($($args),*),
            ElementKind::Lag(e) => e.$method($($args),*),
            ElementKind::Structural(e) => e.$method($($args),*),
            ElementKind::Aggregator(e) => e.$method($($args),*),
        }
    };
}

/// Stateless routing elements
#[derive(Debug, Clone)]
pub enum StructuralElement {
    Splitter(Splitter),
    Junction(Junction),
    Transparent(Transparent),
    Filter(Filter),
}

/// Any element a unit can hold
#[derive(Debug)]
pub enum ElementKind {
    Reservoir(ReservoirElement),
    Lag(LagElement),
    Structural(StructuralElement),
    Aggregator(FluxAggregator),
}

macro_rules! impl_element_delegation {
    ($ty:ident, $dispatch:ident) => {
        impl Element for $ty {
            fn id(&self) -> &str {
                $dispatch!(self, id,)
            }

            fn num_upstream(&self) -> usize {
                $dispatch!(self, num_upstream,)
            }

            fn num_downstream(&self) -> usize {
                $dispatch!(self, num_downstream,)
            }

            fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
                $dispatch!(self, output_widths, input_widths)
            }

            fn set_timestep(&mut self, dt: f64) {
                $dispatch!(self, set_timestep, dt)
            }

            fn begin_run(&mut self, len: usize) -> Result<()> {
                $dispatch!(self, begin_run, len)
            }

            fn step(&mut self, t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
                $dispatch!(self, step, t, inputs)
            }

            fn abort_run(&mut self) {
                $dispatch!(self, abort_run,)
            }

            fn rollback(&mut self, steps: usize) {
                $dispatch!(self, rollback, steps)
            }

            fn check_overrides(&self, overrides: Option<&States>) -> Result<()> {
                $dispatch!(self, check_overrides, overrides)
            }

            fn reset_state(&mut self, overrides: Option<&States>) -> Result<()> {
                $dispatch!(self, reset_state, overrides)
            }

            fn inputs(&self) -> &[Vec<Vec<f64>>] {
                $dispatch!(self, inputs,)
            }

            fn inputs_mut(&mut self) -> &mut SeriesStreams {
                $dispatch!(self, inputs_mut,)
            }

            fn outputs(&self) -> &[Vec<Vec<f64>>] {
                $dispatch!(self, outputs,)
            }

            fn storage_change(&self) -> f64 {
                $dispatch!(self, storage_change,)
            }

            fn losses(&self) -> f64 {
                $dispatch!(self, losses,)
            }

            fn is_stateful(&self) -> bool {
                $dispatch!(self, is_stateful,)
            }
        }
    };
}

impl_element_delegation!(StructuralElement, dispatch_structural);
impl_element_delegation!(ElementKind, dispatch_element);

impl ElementKind {
    /// Short name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            ElementKind::Reservoir(_) => "reservoir",
            ElementKind::Lag(_) => "lag",
            ElementKind::Structural(StructuralElement::Splitter(_)) => "splitter",
            ElementKind::Structural(StructuralElement::Junction(_)) => "junction",
            ElementKind::Structural(StructuralElement::Transparent(_)) => "transparent",
            ElementKind::Structural(StructuralElement::Filter(_)) => "filter",
            ElementKind::Aggregator(_) => "aggregator",
        }
    }

    pub fn as_reservoir(&self) -> Option<&ReservoirElement> {
        match self {
            ElementKind::Reservoir(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_lag(&self) -> Option<&LagElement> {
        match self {
            ElementKind::Lag(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_aggregator(&self) -> Option<&FluxAggregator> {
        match self {
            ElementKind::Aggregator(e) => Some(e),
            _ => None,
        }
    }

    /// Read an attribute without solving
    pub fn get_internal(&self, attribute: &Attribute) -> Result<InternalValue> {
        let value = match (self, attribute) {
            (_, Attribute::Output) => Some(InternalValue::Streams(self.outputs().to_vec())),
            (_, Attribute::Losses) => Some(InternalValue::Scalar(self.losses())),
            (_, Attribute::StorageChange) => Some(InternalValue::Scalar(self.storage_change())),
            (ElementKind::Reservoir(r), Attribute::State(name)) if name == STORAGE => {
                Some(InternalValue::Scalar(r.state()))
            }
            (ElementKind::Reservoir(r), Attribute::StateArray(name)) if name == STORAGE => {
                Some(InternalValue::Series(r.state_array().to_vec()))
            }
            (ElementKind::Reservoir(r), Attribute::Parameter(name)) => {
                r.parameter(name).cloned().map(InternalValue::Parameter)
            }
            (ElementKind::Reservoir(r), Attribute::BoundsViolations) => {
                Some(InternalValue::Violations(r.bounds_violations().to_vec()))
            }
            (ElementKind::Lag(l), Attribute::State(name)) if name == LAG_BUFFER => {
                Some(InternalValue::Buffers(l.buffers().to_vec()))
            }
            (ElementKind::Lag(l), Attribute::StateArray(name)) if name == LAG_BUFFER => {
                Some(InternalValue::BufferHistory(l.state_array().to_vec()))
            }
            (ElementKind::Lag(l), Attribute::Parameter(name)) => {
                l.parameters().get(name).cloned().map(InternalValue::Parameter)
            }
            _ => None,
        };
        value.ok_or_else(|| SuperflexError::attribute(self.id(), attribute.to_string()))
    }

    /// Invoke an operation on this element alone
    ///
    /// Returns a value for `GetOutput`, `None` otherwise.
    pub fn call_internal(&mut self, call: ElementCall) -> Result<Option<InternalValue>> {
        match call {
            ElementCall::GetOutput { solve } => {
                Ok(Some(InternalValue::Streams(self.get_output(solve)?)))
            }
            ElementCall::ResetState(overrides) => {
                self.reset_state(overrides.as_ref())?;
                Ok(None)
            }
            ElementCall::SetParameter { name, value } => {
                match self {
                    ElementKind::Reservoir(r) => r.set_parameter(&name, value)?,
                    ElementKind::Lag(l) => l.set_parameter(&name, value)?,
                    _ => return Err(SuperflexError::attribute(self.id(), format!("parameter `{name}`"))),
                }
                Ok(None)
            }
        }
    }
}

impl From<ReservoirElement> for ElementKind {
    fn from(e: ReservoirElement) -> Self {
        ElementKind::Reservoir(e)
    }
}

impl From<LagElement> for ElementKind {
    fn from(e: LagElement) -> Self {
        ElementKind::Lag(e)
    }
}

impl From<FluxAggregator> for ElementKind {
    fn from(e: FluxAggregator) -> Self {
        ElementKind::Aggregator(e)
    }
}

impl From<StructuralElement> for ElementKind {
    fn from(e: StructuralElement) -> Self {
        ElementKind::Structural(e)
    }
}

macro_rules! impl_from_structural {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for StructuralElement {
                fn from(e: $variant) -> Self {
                    StructuralElement::$variant(e)
                }
            }

            impl From<$variant> for ElementKind {
                fn from(e: $variant) -> Self {
                    ElementKind::Structural(StructuralElement::$variant(e))
                }
            }
        )*
    };
}

impl_from_structural!(Splitter, Junction, Transparent, Filter);
