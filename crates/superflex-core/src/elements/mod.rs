//! Element implementations

mod aggregator;
mod filter;
mod junction;
mod lag;
mod reservoir;
mod splitter;
mod transparent;

pub use aggregator::FluxAggregator;
pub use filter::{Filter, FilterRule};
pub use junction::Junction;
pub use lag::{KernelShape, LagElement};
pub use reservoir::{ReservoirElement, ReservoirFluxes};
pub use splitter::Splitter;
pub use transparent::Transparent;
