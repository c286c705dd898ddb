//! Engine constants and defaults

/// Default timestep duration
pub const DEFAULT_TIMESTEP: f64 = 1.0;

/// Tolerance on splitter weight column sums
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Growth factor applied to a bracket on each outward expansion
pub const BRACKET_GROWTH: f64 = 1.6;

/// Initial bracket width when both guesses coincide
pub const BRACKET_SEED_WIDTH: f64 = 1e-2;

/// Largest kernel a lag element may allocate, in bins per channel
pub const MAX_KERNEL_SUPPORT: usize = 100_000;

/// Name of the lag-time parameter of lag elements
pub const LAG_TIME: &str = "lag-time";

/// Name of the buffer state of lag elements
pub const LAG_BUFFER: &str = "buffer";

/// Name of the storage state of reservoirs
pub const STORAGE: &str = "S0";
