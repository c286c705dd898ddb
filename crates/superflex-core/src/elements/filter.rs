//! Filter: memoryless masking of a flux stream

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};
use crate::utils::constants::DEFAULT_TIMESTEP;

/// Rule applied by a [`Filter`] at every timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterRule {
    /// `[P, E] -> [max(P - E, 0), max(E - P, 0)]`
    ///
    /// The intercepted amount `min(P, E)` evaporates and counts as a loss.
    Interception,
    /// Clamp every flux to `[min, max]`; the excess counts as a loss
    Clamp { min: f64, max: f64 },
}

/// Filter element
///
/// Applies a [`FilterRule`] to the current timestep's stream. No memory.
#[derive(Debug, Clone)]
pub struct Filter {
    id: String,
    rule: FilterRule,
    dt: f64,
    /// Mass removed at each step of the current run
    losses: Vec<f64>,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl Filter {
    /// Create a filter
    ///
    /// Fails with `InvalidParameter` when a clamp range is empty or NaN.
    pub fn new(id: impl Into<String>, rule: FilterRule) -> Result<Self> {
        let id = id.into();
        if let FilterRule::Clamp { min, max } = rule {
            if min.is_nan() || max.is_nan() || min > max {
                return Err(SuperflexError::parameter(
                    &id,
                    "clamp",
                    format!("empty range [{min}, {max}]"),
                ));
            }
        }
        Ok(Self {
            id,
            rule,
            dt: DEFAULT_TIMESTEP,
            losses: Vec::new(),
            inputs: Vec::new(),
            cache: OutputCache::default(),
        })
    }

    /// Interception filter over `[P, E]`
    pub fn interception(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rule: FilterRule::Interception,
            dt: DEFAULT_TIMESTEP,
            losses: Vec::new(),
            inputs: Vec::new(),
            cache: OutputCache::default(),
        }
    }

    pub fn rule(&self) -> FilterRule {
        self.rule
    }

    fn apply(&self, input: &[f64]) -> (Vec<f64>, f64) {
        match self.rule {
            FilterRule::Interception => {
                let (p, e) = (input[0], input[1]);
                (vec![(p - e).max(0.0), (e - p).max(0.0)], p.min(e))
            }
            FilterRule::Clamp { min, max } => {
                let clamped: Vec<f64> = input.iter().map(|x| x.clamp(min, max)).collect();
                let removed = input.iter().zip(&clamped).map(|(x, c)| x - c).sum();
                (clamped, removed)
            }
        }
    }
}

impl Element for Filter {
    fn id(&self) -> &str {
        &self.id
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        match (self.rule, input_widths) {
            (FilterRule::Interception, [2]) => Ok(vec![2]),
            (FilterRule::Clamp { .. }, [w]) => Ok(vec![*w]),
            _ => Err(SuperflexError::InvalidTopology(format!(
                "filter `{}` cannot take streams of widths {:?}",
                self.id, input_widths
            ))),
        }
    }

    fn set_timestep(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn begin_run(&mut self, _len: usize) -> Result<()> {
        self.cache.clear();
        self.losses.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let input = match (self.rule, inputs) {
            (FilterRule::Interception, [input]) if input.len() == 2 => input,
            (FilterRule::Clamp { .. }, [input]) => input,
            _ => return Err(SuperflexError::input(&self.id, "unexpected stream shape")),
        };
        let (filtered, removed) = self.apply(input);
        self.losses.push(removed * self.dt);
        let out = vec![filtered];
        self.cache.record(&out);
        Ok(out)
    }

    fn rollback(&mut self, steps: usize) {
        self.losses.truncate(steps);
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

    fn losses(&self) -> f64 {
        self.losses.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interception() {
        let mut filter = Filter::interception("ir");
        filter.set_timestep(2.0);
        filter.set_input(vec![vec![vec![5.0, 1.0], vec![2.0, 3.0]]]);
        let out = filter.get_output(true).unwrap();
        assert_eq!(out[0][0], vec![3.0, 0.0]);
        assert_eq!(out[0][1], vec![0.0, 2.0]);
        // (2 + 1) intercepted, over dt = 2
        assert_relative_eq!(filter.losses(), 6.0);
    }

    #[test]
    fn test_clamp_counts_excess() {
        let mut filter = Filter::new("cl", FilterRule::Clamp { min: 0.0, max: 4.0 }).unwrap();
        let out = filter.step(0, &[vec![6.0, 1.0, 3.0]]).unwrap();
        assert_eq!(out, vec![vec![4.0, 1.0, 3.0]]);
        assert_relative_eq!(filter.losses(), 2.0);
    }

    #[test]
    fn test_rollback_drops_later_losses() {
        let mut filter = Filter::new("cl", FilterRule::Clamp { min: 0.0, max: 1.0 }).unwrap();
        filter.set_input(vec![vec![vec![2.0, 5.0, 1.5]]]);
        filter.get_output(true).unwrap();
        assert_relative_eq!(filter.losses(), 5.5);
        filter.rollback(1);
        assert_relative_eq!(filter.losses(), 1.0);
    }

    #[test]
    fn test_empty_clamp_rejected() {
        assert!(Filter::new("cl", FilterRule::Clamp { min: 1.0, max: 0.0 }).is_err());
    }

    #[test]
    fn test_interception_needs_two_fluxes() {
        let filter = Filter::interception("ir");
        assert!(filter.output_widths(&[3]).is_err());
        assert_eq!(filter.output_widths(&[2]).unwrap(), vec![2]);
    }
}
