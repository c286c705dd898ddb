//! Solver and run settings types.

use serde::{Deserialize, Serialize};

/// Available root-finding algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootFinderKind {
    /// Bracketing secant method (Dowell & Jarratt)
    #[default]
    Pegasus,
    /// Safeguarded Newton-Raphson with finite-difference derivative
    Newton,
}

impl RootFinderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootFinderKind::Pegasus => "Pegasus",
            RootFinderKind::Newton => "Newton",
        }
    }
}

/// Available time discretisation schemes for reservoir ODEs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheme {
    /// Backward Euler, solved with a root finder
    #[default]
    ImplicitEuler,
    /// Forward Euler, clipped to the state bounds
    ExplicitEuler,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::ImplicitEuler => "ImplicitEuler",
            Scheme::ExplicitEuler => "ExplicitEuler",
        }
    }
}

/// Root-finder settings, scoped to a single solve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootFinderSettings {
    /// Residual tolerance: |f(x)| below this is a root
    pub tol_f: f64,

    /// Bracket width tolerance
    pub tol_x: f64,

    /// Hard cap on iterations
    pub max_iterations: usize,

    /// Hard cap on outward bracket expansions
    pub max_expansions: usize,

    /// Relative step for finite-difference derivatives
    pub perturbation: f64,
}

impl Default for RootFinderSettings {
    fn default() -> Self {
        Self {
            tol_f: 1e-8,
            tol_x: 1e-8,
            max_iterations: 100,
            max_expansions: 50,
            perturbation: 1e-6,
        }
    }
}

/// Numerical approximation settings shared by the reservoirs of a unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericalSettings {
    /// Time discretisation scheme
    pub scheme: Scheme,

    /// Root finder used by implicit schemes
    pub root_finder: RootFinderKind,

    /// Root-finder tolerances and budgets
    pub root_finder_settings: RootFinderSettings,
}

/// Run settings for a unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Timestep duration
    pub dt: f64,

    /// Evaluate the elements of a layer on the rayon pool
    pub parallel_layers: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            dt: 1.0,
            parallel_layers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_finder_defaults() {
        let settings = RootFinderSettings::default();
        assert_eq!(settings.max_iterations, 100);
        assert_eq!(settings.max_expansions, 50);
        assert!(settings.tol_f > 0.0 && settings.tol_x > 0.0);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let json = r#"{ "root_finder": "Newton", "root_finder_settings": { "max_iterations": 7 } }"#;
        let settings: NumericalSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.root_finder, RootFinderKind::Newton);
        assert_eq!(settings.scheme, Scheme::ImplicitEuler);
        assert_eq!(settings.root_finder_settings.max_iterations, 7);
        assert_eq!(settings.root_finder_settings.max_expansions, 50);
    }

    #[test]
    fn test_run_settings_roundtrip() {
        let settings = RunSettings {
            dt: 0.5,
            parallel_layers: true,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: RunSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RootFinderKind::Pegasus.as_str(), "Pegasus");
        assert_eq!(Scheme::ExplicitEuler.as_str(), "ExplicitEuler");
    }
}
