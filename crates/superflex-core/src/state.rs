//! Element state overrides

use std::collections::BTreeMap;

/// A state value supplied when resetting an element
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// Storage of a reservoir
    Scalar(f64),
    /// In-transit buffers of a lag element, one per flux channel
    Buffers(Vec<Vec<f64>>),
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Scalar(value)
    }
}

impl From<Vec<Vec<f64>>> for StateValue {
    fn from(buffers: Vec<Vec<f64>>) -> Self {
        StateValue::Buffers(buffers)
    }
}

/// Named state overrides for one element
pub type States = BTreeMap<String, StateValue>;
