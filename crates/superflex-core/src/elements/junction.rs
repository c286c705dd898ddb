//! Junction: many streams to one

use superflex_types::JunctionSpec;
use tracing::warn;

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};

/// Junction element
///
/// Merges several upstream streams into one. `direction[o][u]` names the
/// flux of upstream stream `u` feeding output flux `o`; when several
/// upstream streams feed the same output, their fluxes are summed. `None`
/// entries are never read.
///
/// Every output must have at least one source, and no upstream flux may
/// feed two outputs.
#[derive(Debug, Clone)]
pub struct Junction {
    id: String,
    direction: Vec<Vec<Option<usize>>>,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl Junction {
    /// Create a junction
    pub fn new(id: impl Into<String>, direction: Vec<Vec<Option<usize>>>) -> Result<Self> {
        let id = id.into();
        let upstream = direction.first().map_or(0, Vec::len);
        if direction.is_empty() || upstream == 0 {
            return Err(SuperflexError::InvalidTopology(format!(
                "junction `{id}` needs at least one output and one upstream stream"
            )));
        }
        if direction.iter().any(|row| row.len() != upstream) {
            return Err(SuperflexError::InvalidTopology(format!(
                "junction `{id}` direction rows differ in length"
            )));
        }
        if let Some(o) = direction.iter().position(|row| row.iter().all(Option::is_none)) {
            return Err(SuperflexError::InvalidTopology(format!(
                "junction `{id}` output {o} has no source"
            )));
        }
        for u in 0..upstream {
            let mut sources: Vec<usize> = direction.iter().filter_map(|row| row[u]).collect();
            let before = sources.len();
            sources.sort_unstable();
            sources.dedup();
            if sources.len() != before {
                return Err(SuperflexError::InvalidTopology(format!(
                    "junction `{id}` reads a flux of upstream stream {u} more than once"
                )));
            }
        }
        Ok(Self {
            id,
            direction,
            inputs: Vec::new(),
            cache: OutputCache::default(),
        })
    }

    pub fn direction(&self) -> &[Vec<Option<usize>>] {
        &self.direction
    }
}

impl TryFrom<JunctionSpec> for Junction {
    type Error = SuperflexError;

    fn try_from(spec: JunctionSpec) -> Result<Self> {
        Junction::new(spec.id, spec.direction)
    }
}

impl Element for Junction {
    fn id(&self) -> &str {
        &self.id
    }

    fn num_upstream(&self) -> usize {
        self.direction[0].len()
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        if input_widths.len() != self.num_upstream() {
            return Err(SuperflexError::InvalidTopology(format!(
                "junction `{}` expects {} upstream streams, got {}",
                self.id,
                self.num_upstream(),
                input_widths.len()
            )));
        }
        for (u, width) in input_widths.iter().enumerate() {
            let read: Vec<usize> = self.direction.iter().filter_map(|row| row[u]).collect();
            if let Some(i) = read.iter().find(|i| **i >= *width) {
                return Err(SuperflexError::InvalidTopology(format!(
                    "junction `{}` reads flux {i} of upstream stream {u}, which has {width}",
                    self.id
                )));
            }
            if read.len() < *width {
                warn!(
                    junction = %self.id,
                    upstream = u,
                    "upstream fluxes not forwarded by any output"
                );
            }
        }
        Ok(vec![self.direction.len()])
    }

    fn begin_run(&mut self, _len: usize) -> Result<()> {
        self.cache.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        if inputs.len() != self.num_upstream() {
            return Err(SuperflexError::input(
                &self.id,
                format!("expected {} upstream streams", self.num_upstream()),
            ));
        }
        let mut merged = Vec::with_capacity(self.direction.len());
        for row in &self.direction {
            let mut total = 0.0;
            for (stream, source) in inputs.iter().zip(row) {
                if let Some(i) = source {
                    total += stream.get(*i).copied().ok_or_else(|| {
                        SuperflexError::input(&self.id, format!("upstream flux {i} missing"))
                    })?;
                }
            }
            merged.push(total);
        }
        let out = vec![merged];
        self.cache.record(&out);
        Ok(out)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_and_sums() {
        // Output 0 = a[0] + b[1], output 1 = a[1]
        let mut jun = Junction::new("jun", vec![vec![Some(0), Some(1)], vec![Some(1), None]]).unwrap();
        let out = jun.step(0, &[vec![1.0, 2.0], vec![10.0, 20.0]]).unwrap();
        assert_eq!(out, vec![vec![21.0, 2.0]]);
    }

    #[test]
    fn test_unset_slots_are_not_read() {
        // Stream 1 is one flux wide; the `None` slot must not index it
        let mut jun = Junction::new("jun", vec![vec![Some(0), None], vec![None, Some(0)]]).unwrap();
        assert_eq!(jun.output_widths(&[1, 1]).unwrap(), vec![2]);
        let out = jun.step(0, &[vec![3.0], vec![4.0]]).unwrap();
        assert_eq!(out, vec![vec![3.0, 4.0]]);
    }

    #[test]
    fn test_output_without_source_rejected() {
        let err = Junction::new("jun", vec![vec![Some(0), None], vec![None, None]]).unwrap_err();
        assert!(matches!(err, SuperflexError::InvalidTopology(_)));
    }

    #[test]
    fn test_double_read_rejected() {
        assert!(Junction::new("jun", vec![vec![Some(0)], vec![Some(0)]]).is_err());
    }

    #[test]
    fn test_out_of_range_source_rejected() {
        let jun = Junction::new("jun", vec![vec![Some(2), Some(0)]]).unwrap();
        assert!(jun.output_widths(&[2, 1]).is_err());
        assert!(jun.output_widths(&[3]).is_err());
    }
}
