//! Transparent: identity pass-through

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};

/// Transparent element
///
/// Forwards its stream unchanged. Used to carry a branch through a layer
/// where it has nothing to do.
#[derive(Debug, Clone)]
pub struct Transparent {
    id: String,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl Transparent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            cache: OutputCache::default(),
        }
    }
}

impl Element for Transparent {
    fn id(&self) -> &str {
        &self.id
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        match input_widths {
            [w] => Ok(vec![*w]),
            _ => Err(SuperflexError::InvalidTopology(format!(
                "transparent `{}` expects one stream, got {}",
                self.id,
                input_widths.len()
            ))),
        }
    }

    fn begin_run(&mut self, _len: usize) -> Result<()> {
        self.cache.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let out = inputs.to_vec();
        if out.len() != 1 {
            return Err(SuperflexError::input(&self.id, "expected one stream"));
        }
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
    fn test_forwards_stream_unchanged() {
        let mut tr = Transparent::new("tr");
        let input = vec![vec![vec![1.0, 2.5, 0.0], vec![3.0, -1.0, 4.0]]];
        tr.set_input(input.clone());
        assert_eq!(tr.get_output(true).unwrap(), input);
        assert_eq!(tr.get_output(false).unwrap(), input);
    }

    #[test]
    fn test_widths() {
        let tr = Transparent::new("tr");
        assert_eq!(tr.output_widths(&[3]).unwrap(), vec![3]);
        assert!(matches!(
            tr.output_widths(&[1, 1]),
            Err(SuperflexError::InvalidTopology(_))
        ));
        assert!(tr.output_widths(&[]).is_err());
    }
}
