//! Topology description types for structural elements.

use serde::{Deserialize, Serialize};

/// Description of a splitter.
///
/// `weights[k][i]` is the share of input flux `i` sent to output stream `k`.
/// `direction[k][m]` names the input flux placed at position `m` of output
/// stream `k`; `None` leaves that position empty (zero flux).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterSpec {
    /// Element identifier
    pub id: String,

    /// Weight per output stream per input flux
    pub weights: Vec<Vec<f64>>,

    /// Input flux index per output stream position
    #[serde(default)]
    pub direction: Option<Vec<Vec<Option<usize>>>>,
}

/// Description of a junction.
///
/// `direction[o][u]` names the flux of upstream stream `u` that feeds output
/// flux `o`; `None` means stream `u` contributes nothing to `o`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionSpec {
    /// Element identifier
    pub id: String,

    /// Upstream flux index per output flux per upstream stream
    pub direction: Vec<Vec<Option<usize>>>,
}
