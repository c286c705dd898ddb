//! superflex-core - conceptual hydrological model engine
//!
//! Models are assembled from reusable elements and executed over a forcing
//! time series:
//! - Reservoirs whose mass balance is an ODE, advanced by an implicit
//!   (or explicit) Euler step closed with a scalar root finder
//! - Lag elements convolving fluxes with unit-hydrograph kernels
//! - Structural elements that split, join, filter or forward flux streams
//! - Flux aggregators reducing the last layer to named outputs
//!
//! A [`Unit`] owns the elements in layers and drives the timestep loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use superflex_core::prelude::*;
//!
//! let numerical = Arc::new(ImplicitEuler::default());
//! let store = ReservoirElement::new(
//!     "fr",
//!     PowerReservoir,
//!     Parameters::new().with("k", 0.1).with("alpha", 1.0),
//!     Some(10.0),
//!     numerical,
//! )?;
//! let lag = LagElement::new("uh", KernelShape::PowerLaw { exponent: 2.5 }, 2.0, 1, None)?;
//!
//! let mut unit = Unit::new("model", vec![vec![store.into()], vec![lag.into()]])?;
//! unit.set_input(vec![vec![5.0, 0.0, 0.0, 2.0]])?;
//! let q = unit.get_output(true)?;
//! ```

pub mod element;
pub mod element_kind;
pub mod elements;
pub mod error;
pub mod inspect;
pub mod models;
pub mod numerical;
pub mod parameters;
pub mod root_finder;
pub mod state;
pub mod unit;
pub mod utils;

pub use element::{Element, SeriesStreams, Streams};
pub use element_kind::{ElementKind, StructuralElement};
pub use elements::*;
pub use error::{Result, RootFinderError, SuperflexError};
pub use inspect::{Attribute, ElementCall, InternalValue};
pub use numerical::{BoundsViolation, ExplicitEuler, FluxBalance, ImplicitEuler, NumericalApproximation};
pub use parameters::{ParameterValue, Parameters};
pub use root_finder::{Newton, Pegasus, Root, RootFinder};
pub use state::{StateValue, States};
pub use unit::{ElementId, MassBalance, Unit};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::element::{Element, SeriesStreams, Streams};
    pub use crate::element_kind::{ElementKind, StructuralElement};
    pub use crate::elements::*;
    pub use crate::error::{Result, RootFinderError, SuperflexError};
    pub use crate::inspect::{Attribute, ElementCall, InternalValue};
    pub use crate::models::gr4j::{self, Gr4jParameters};
    pub use crate::models::PowerReservoir;
    pub use crate::numerical::{
        BoundsViolation, ExplicitEuler, FluxBalance, ImplicitEuler, NumericalApproximation,
    };
    pub use crate::parameters::{ParameterValue, Parameters};
    pub use crate::root_finder::{Newton, Pegasus, Root, RootFinder};
    pub use crate::state::{StateValue, States};
    pub use crate::unit::{ElementId, MassBalance, Unit};
    pub use superflex_types::{
        NumericalSettings, RootFinderKind, RootFinderSettings, RunSettings, Scheme,
    };
}
