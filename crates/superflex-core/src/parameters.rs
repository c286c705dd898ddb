//! Named element parameters

use std::collections::BTreeMap;

use crate::error::{Result, SuperflexError};

/// A parameter value: constant, or one value per timestep
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Scalar(f64),
    Series(Vec<f64>),
}

impl ParameterValue {
    /// Value at timestep `t`
    ///
    /// Series shorter than `t` return their last value; lengths are checked
    /// against the run before it starts.
    #[inline]
    pub fn at(&self, t: usize) -> f64 {
        match self {
            ParameterValue::Scalar(v) => *v,
            ParameterValue::Series(values) => values
                .get(t)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(f64::NAN),
        }
    }

    /// Number of timesteps covered, `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            ParameterValue::Scalar(_) => None,
            ParameterValue::Series(values) => Some(values.len()),
        }
    }

    /// Iterate over every value held
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let values: &[f64] = match self {
            ParameterValue::Scalar(v) => std::slice::from_ref(v),
            ParameterValue::Series(values) => values,
        };
        values.iter().copied()
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(values: Vec<f64>) -> Self {
        ParameterValue::Series(values)
    }
}

/// Named parameter mapping owned by an element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Value of `name` at timestep `t`
    pub fn value(&self, name: &str, t: usize) -> Option<f64> {
        self.values.get(name).map(|v| v.at(t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that every name in `required` is present and finite
    pub fn require(&self, element: &str, required: &[&str]) -> Result<()> {
        for name in required {
            let value = self
                .values
                .get(*name)
                .ok_or_else(|| SuperflexError::parameter(element, *name, "missing"))?;
            if value.values().any(|v| !v.is_finite()) {
                return Err(SuperflexError::parameter(element, *name, "not finite"));
            }
            if value.len() == Some(0) {
                return Err(SuperflexError::parameter(element, *name, "empty series"));
            }
        }
        Ok(())
    }

    /// Check that series parameters cover exactly `len` timesteps
    pub fn check_len(&self, element: &str, len: usize) -> Result<()> {
        for (name, value) in &self.values {
            if let Some(n) = value.len() {
                if n != len {
                    return Err(SuperflexError::parameter(
                        element,
                        name.as_str(),
                        format!("series has {n} values, run has {len} timesteps"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Longest series length, `None` if every parameter is scalar
    pub fn series_len(&self) -> Option<usize> {
        self.values.values().filter_map(ParameterValue::len).max()
    }

    /// Resolve `names` at timestep `t` into `out`, in order
    pub(crate) fn resolve_into(&self, names: &[&str], t: usize, out: &mut Vec<f64>) {
        out.clear();
        out.extend(names.iter().map(|n| self.value(n, t).unwrap_or(f64::NAN)));
    }
}
