//! Inspection of elements by identifier
//!
//! `get_internal` reads an [`Attribute`] of an element without solving;
//! `call_internal` invokes an [`ElementCall`] on it.

use std::fmt;

use crate::element::SeriesStreams;
use crate::numerical::BoundsViolation;
use crate::parameters::ParameterValue;
use crate::state::States;

/// Readable attribute of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Cached outputs of the last run
    Output,
    /// Current value of a named state
    State(String),
    /// History of a named state over the last run
    StateArray(String),
    Parameter(String),
    /// Time-integrated declared losses of the last run
    Losses,
    /// Net storage change of the last run
    StorageChange,
    BoundsViolations,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Output => write!(f, "output"),
            Attribute::State(name) => write!(f, "state `{name}`"),
            Attribute::StateArray(name) => write!(f, "state array `{name}`"),
            Attribute::Parameter(name) => write!(f, "parameter `{name}`"),
            Attribute::Losses => write!(f, "losses"),
            Attribute::StorageChange => write!(f, "storage change"),
            Attribute::BoundsViolations => write!(f, "bounds violations"),
        }
    }
}

/// Value returned by inspection
#[derive(Debug, Clone, PartialEq)]
pub enum InternalValue {
    Scalar(f64),
    Series(Vec<f64>),
    Streams(SeriesStreams),
    /// Lag buffers, one per channel
    Buffers(Vec<Vec<f64>>),
    /// Lag buffer history, `[t][channel][bin]`
    BufferHistory(Vec<Vec<Vec<f64>>>),
    Parameter(ParameterValue),
    Violations(Vec<BoundsViolation>),
}

impl InternalValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            InternalValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            InternalValue::Series(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_streams(&self) -> Option<&SeriesStreams> {
        match self {
            InternalValue::Streams(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_buffers(&self) -> Option<&[Vec<f64>]> {
        match self {
            InternalValue::Buffers(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_violations(&self) -> Option<&[BoundsViolation]> {
        match self {
            InternalValue::Violations(v) => Some(v),
            _ => None,
        }
    }
}

/// Operation invoked on an element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    /// Outputs; `solve = true` recomputes them first
    GetOutput { solve: bool },
    /// Reset state, optionally to the given overrides
    ResetState(Option<States>),
    /// Replace a parameter between runs
    SetParameter { name: String, value: ParameterValue },
}
