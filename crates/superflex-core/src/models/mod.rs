//! Reservoir parameterisations and assembled models
//!
//! The engine only knows the generic reservoir; everything here is a set of
//! flux equations plugged into it, plus builders that lay out whole units.

pub mod gr4j;
mod power;

pub use power::PowerReservoir;
