//! Shared types for superflex units.
//!
//! This crate defines the plain data structures exchanged between the engine
//! and whatever layer builds models from configuration:
//! - Root-finder and numerical-scheme settings
//! - Run settings for a unit
//! - Topology descriptions for splitters and junctions

mod settings;
mod topology;

pub use settings::*;
pub use topology::*;
