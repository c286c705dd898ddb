//! Flux aggregator: named sums at the end of a unit

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};

/// Flux aggregator
///
/// Reduces one stream to one flux per named output; each output is the sum
/// of the channels declared for it. Channels may feed several outputs.
#[derive(Debug, Clone)]
pub struct FluxAggregator {
    id: String,
    outputs: Vec<(String, Vec<usize>)>,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl FluxAggregator {
    /// Create an aggregator from `(name, channels)` pairs, in output order
    ///
    /// Fails with `InvalidTopology` when an output has no channel, lists a
    /// channel twice, or two outputs share a name.
    pub fn new(id: impl Into<String>, outputs: Vec<(String, Vec<usize>)>) -> Result<Self> {
        let id = id.into();
        if outputs.is_empty() {
            return Err(SuperflexError::InvalidTopology(format!(
                "aggregator `{id}` declares no outputs"
            )));
        }
        for (k, (name, channels)) in outputs.iter().enumerate() {
            if channels.is_empty() {
                return Err(SuperflexError::InvalidTopology(format!(
                    "aggregator `{id}` output `{name}` has no contributing channel"
                )));
            }
            let mut sorted = channels.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != channels.len() {
                return Err(SuperflexError::InvalidTopology(format!(
                    "aggregator `{id}` output `{name}` lists a channel twice"
                )));
            }
            if outputs[..k].iter().any(|(other, _)| other == name) {
                return Err(SuperflexError::InvalidTopology(format!(
                    "aggregator `{id}` declares output `{name}` twice"
                )));
            }
        }
        Ok(Self {
            id,
            outputs,
            inputs: Vec::new(),
            cache: OutputCache::default(),
        })
    }

    /// Output names, in output order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(name, _)| name.as_str())
    }

    /// Cached series of one named output
    pub fn named_output(&self, name: &str) -> Option<&[f64]> {
        let index = self.outputs.iter().position(|(n, _)| n == name)?;
        self.cache
            .series()
            .first()
            .and_then(|stream| stream.get(index))
            .map(Vec::as_slice)
    }
}

impl Element for FluxAggregator {
    fn id(&self) -> &str {
        &self.id
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        let [width] = input_widths else {
            return Err(SuperflexError::InvalidTopology(format!(
                "aggregator `{}` expects one stream, got {}",
                self.id,
                input_widths.len()
            )));
        };
        for (name, channels) in &self.outputs {
            if let Some(c) = channels.iter().find(|c| **c >= *width) {
                return Err(SuperflexError::InvalidTopology(format!(
                    "aggregator `{}` output `{name}` reads channel {c} of {width}",
                    self.id
                )));
            }
        }
        Ok(vec![self.outputs.len()])
    }

    fn begin_run(&mut self, _len: usize) -> Result<()> {
        self.cache.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let [input] = inputs else {
            return Err(SuperflexError::input(&self.id, "expected one stream"));
        };
        let mut totals = Vec::with_capacity(self.outputs.len());
        for (name, channels) in &self.outputs {
            let mut total = 0.0;
            for c in channels {
                total += input.get(*c).copied().ok_or_else(|| {
                    SuperflexError::input(&self.id, format!("channel {c} of `{name}` missing"))
                })?;
            }
            totals.push(total);
        }
        let out = vec![totals];
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
