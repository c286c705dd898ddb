//! Engine error types

use thiserror::Error;

/// Root-finding failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RootFinderError {
    #[error("did not converge after {iterations} iterations (|f| = {residual:e})")]
    NonConvergence { iterations: usize, residual: f64 },

    #[error("no sign change found after {expansions} bracket expansions")]
    NoBracket { expansions: usize },

    #[error("residual is not finite at x = {at}")]
    NonFinite { at: f64 },
}

/// Errors raised while building or running elements and units
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuperflexError {
    #[error("element `{element}` failed at timestep {timestep}: {source}")]
    NonConvergence {
        element: String,
        timestep: usize,
        #[source]
        source: RootFinderError,
    },

    #[error("element `{element}`: invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        element: String,
        name: String,
        reason: String,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("element `{element}`: invalid input: {reason}")]
    InvalidInput { element: String, reason: String },

    #[error("timestep {0} must be finite and positive")]
    InvalidTimestep(f64),

    #[error("unknown element `{0}`")]
    UnknownElement(String),

    #[error("element `{element}` has no attribute `{attribute}`")]
    UnknownAttribute { element: String, attribute: String },
}

impl SuperflexError {
    pub(crate) fn parameter(
        element: &str,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            element: element.to_string(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn input(element: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn attribute(element: &str, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            element: element.to_string(),
            attribute: attribute.into(),
        }
    }
}

/// Engine result alias
pub type Result<T> = std::result::Result<T, SuperflexError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_non_convergence_reports_element_and_timestep() {
        let err = SuperflexError::NonConvergence {
            element: "pr".to_string(),
            timestep: 42,
            source: RootFinderError::NonConvergence {
                iterations: 10,
                residual: 1e-3,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("`pr`"));
        assert!(msg.contains("timestep 42"));
        assert!(err.source().is_some());
    }
}
