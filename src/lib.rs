//! superflex - conceptual hydrological model engine
//!
//! Facade over the workspace crates:
//! - [`superflex_types`]: serde settings and topology descriptions
//! - [`superflex_core`]: root finders, numerical approximations, elements,
//!   units and model parameterisations
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use superflex::prelude::*;
//!
//! let params = Gr4jParameters { x1: 320.0, x2: 0.0, x3: 70.0, x4: 1.8 };
//! let mut unit = gr4j::build_unit("catchment", params, Arc::new(ImplicitEuler::default()))?;
//! unit.set_input(vec![precipitation, pet])?;
//! let q = &unit.get_output(true)?[0][0];
//! ```

pub use superflex_core::*;
pub use superflex_types as types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use superflex_core::prelude::*;
    pub use superflex_types::{JunctionSpec, SplitterSpec};
}
