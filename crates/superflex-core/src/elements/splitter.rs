//! Splitter: one stream to many

use nalgebra::DMatrix;
use superflex_types::SplitterSpec;

use crate::element::{Element, OutputCache, SeriesStreams, Streams};
use crate::error::{Result, SuperflexError};
use crate::utils::constants::WEIGHT_SUM_TOLERANCE;

/// Splitter element
///
/// Partitions the fluxes of one upstream stream into several downstream
/// streams. The weight matrix has one row per output stream and one column
/// per input flux; every column sums to one, so no mass is created or lost.
/// `direction[k][m]` picks the input flux placed at position `m` of output
/// stream `k`, scaled by its weight for that stream; `None` leaves the
/// position at zero.
///
/// # Example
///
/// ```ignore
/// // 90 % of the single input flux to stream 0, 10 % to stream 1
/// let split = Splitter::new("spl", vec![vec![0.9], vec![0.1]], None)?;
/// ```
#[derive(Debug, Clone)]
pub struct Splitter {
    id: String,
    weights: DMatrix<f64>,
    direction: Vec<Vec<Option<usize>>>,
    inputs: SeriesStreams,
    cache: OutputCache,
}

impl Splitter {
    /// Create a splitter
    ///
    /// `direction = None` keeps every input flux in place in every stream.
    /// Fails with `InvalidTopology` when a weight column does not sum to
    /// one, or when a weighted flux has no position in its stream.
    pub fn new(
        id: impl Into<String>,
        weights: Vec<Vec<f64>>,
        direction: Option<Vec<Vec<Option<usize>>>>,
    ) -> Result<Self> {
        let id = id.into();
        let streams = weights.len();
        let fluxes = weights.first().map_or(0, Vec::len);
        if streams == 0 || fluxes == 0 {
            return Err(SuperflexError::InvalidTopology(format!(
                "splitter `{id}` needs at least one stream and one flux"
            )));
        }
        if weights.iter().any(|row| row.len() != fluxes) {
            return Err(SuperflexError::InvalidTopology(format!(
                "splitter `{id}` weight rows differ in length"
            )));
        }
        if weights.iter().flatten().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SuperflexError::InvalidTopology(format!(
                "splitter `{id}` weights must be finite and non-negative"
            )));
        }

        let flat: Vec<f64> = weights.into_iter().flatten().collect();
        let weights = DMatrix::from_row_slice(streams, fluxes, &flat);
        for (i, column) in weights.column_iter().enumerate() {
            let sum = column.sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(SuperflexError::InvalidTopology(format!(
                    "splitter `{id}` weights of flux {i} sum to {sum}, not 1"
                )));
            }
        }

        let direction =
            direction.unwrap_or_else(|| vec![(0..fluxes).map(Some).collect(); streams]);
        if direction.len() != streams {
            return Err(SuperflexError::InvalidTopology(format!(
                "splitter `{id}` has {streams} weight rows but {} direction rows",
                direction.len()
            )));
        }
        for (k, row) in direction.iter().enumerate() {
            if let Some(i) = row.iter().flatten().find(|i| **i >= fluxes) {
                return Err(SuperflexError::InvalidTopology(format!(
                    "splitter `{id}` stream {k} points at flux {i}, input has {fluxes}"
                )));
            }
            for i in 0..fluxes {
                let uses = row.iter().filter(|d| **d == Some(i)).count();
                if weights[(k, i)] > 0.0 && uses != 1 {
                    return Err(SuperflexError::InvalidTopology(format!(
                        "splitter `{id}` stream {k} must place flux {i} exactly once, found {uses}"
                    )));
                }
            }
        }

        Ok(Self {
            id,
            weights,
            direction,
            inputs: Vec::new(),
            cache: OutputCache::default(),
        })
    }

    /// Weight matrix: output streams by input fluxes
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn direction(&self) -> &[Vec<Option<usize>>] {
        &self.direction
    }
}

impl TryFrom<SplitterSpec> for Splitter {
    type Error = SuperflexError;

    fn try_from(spec: SplitterSpec) -> Result<Self> {
        Splitter::new(spec.id, spec.weights, spec.direction)
    }
}

impl Element for Splitter {
    fn id(&self) -> &str {
        &self.id
    }

    fn num_downstream(&self) -> usize {
        self.weights.nrows()
    }

    fn output_widths(&self, input_widths: &[usize]) -> Result<Vec<usize>> {
        match input_widths {
            [w] if *w == self.weights.ncols() => Ok(self.direction.iter().map(Vec::len).collect()),
            _ => Err(SuperflexError::InvalidTopology(format!(
                "splitter `{}` expects one stream of {} fluxes, got {:?}",
                self.id,
                self.weights.ncols(),
                input_widths
            ))),
        }
    }

    fn begin_run(&mut self, _len: usize) -> Result<()> {
        self.cache.clear();
        Ok(())
    }

    fn step(&mut self, _t: usize, inputs: &[Vec<f64>]) -> Result<Streams> {
        let input = match inputs {
            [input] if input.len() == self.weights.ncols() => input,
            _ => {
                return Err(SuperflexError::input(
                    &self.id,
                    format!("expected one stream of {} fluxes", self.weights.ncols()),
                ))
            }
        };

        let out: Streams = self
            .direction
            .iter()
            .enumerate()
            .map(|(k, row)| {
                row.iter()
                    .map(|d| d.map_or(0.0, |i| input[i] * self.weights[(k, i)]))
                    .collect()
            })
            .collect();
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
