//! Pegasus bracketing secant method

use superflex_types::RootFinderSettings;

use super::{expand_bracket, Root, RootFinder};
use crate::error::RootFinderError;

/// Pegasus root finder
///
/// Secant interpolation inside a bracket. When the new point keeps the sign
/// of the most recent endpoint, the stale endpoint's residual is scaled by
/// `fb / (fb + fx)` instead of being kept as is, which restores
/// super-linear convergence where plain regula falsi stalls.
///
/// # Mathematical Form
/// ```text
/// x  = b - f(b) (b - a) / (f(b) - f(a))
/// f(x) f(b) < 0  =>  (a, f(a)) <- (b, f(b))
/// otherwise      =>  f(a) <- f(a) f(b) / (f(b) + f(x))
/// (b, f(b)) <- (x, f(x))
/// ```
///
/// # References
/// - Dowell, M., & Jarratt, P. (1972). "The 'Pegasus' method for computing
///   the root of an equation". BIT Numerical Mathematics, 12(4), 503-508.
#[derive(Debug, Clone, Default)]
pub struct Pegasus {
    settings: RootFinderSettings,
}

impl Pegasus {
    /// Create a Pegasus solver with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Pegasus solver with custom settings
    pub fn with_settings(settings: RootFinderSettings) -> Self {
        Self { settings }
    }
}

impl RootFinder for Pegasus {
    fn settings(&self) -> &RootFinderSettings {
        &self.settings
    }

    fn solve(&self, f: &mut dyn FnMut(f64) -> f64, a: f64, b: f64) -> Result<Root, RootFinderError> {
        let tol_f = self.settings.tol_f;
        let tol_x = self.settings.tol_x;
        let bracket = expand_bracket(f, a, b, self.settings.max_expansions)?;
        let (mut a, mut fa, mut b, mut fb) = (bracket.a, bracket.fa, bracket.b, bracket.fb);
        // Unscaled residual at `a`; `fa` carries the Pegasus weighting
        let mut fa_raw = fa;

        if fa.abs() < tol_f {
            return Ok(Root {
                value: a,
                residual: fa,
                iterations: 0,
            });
        }
        if fb.abs() < tol_f {
            return Ok(Root {
                value: b,
                residual: fb,
                iterations: 0,
            });
        }

        for iteration in 1..=self.settings.max_iterations {
            let x = b - fb * (b - a) / (fb - fa);
            let fx = f(x);
            if !fx.is_finite() {
                return Err(RootFinderError::NonFinite { at: x });
            }

            if fx.abs() < tol_f {
                return Ok(Root {
                    value: x,
                    residual: fx,
                    iterations: iteration,
                });
            }

            if fx * fb < 0.0 {
                a = b;
                fa = fb;
                fa_raw = fb;
            } else {
                fa *= fb / (fb + fx);
            }
            b = x;
            fb = fx;

            // Bracket collapsed: only a true root is accepted
            if (b - a).abs() < tol_x {
                let (value, residual) = if fa_raw.abs() < fb.abs() {
                    (a, fa_raw)
                } else {
                    (b, fb)
                };
                if residual.abs() < tol_f {
                    return Ok(Root {
                        value,
                        residual,
                        iterations: iteration,
                    });
                }
                return Err(RootFinderError::NonConvergence {
                    iterations: iteration,
                    residual: residual.abs(),
                });
            }
        }

        Err(RootFinderError::NonConvergence {
            iterations: self.settings.max_iterations,
            residual: fb.abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pegasus_sqrt2() {
        let solver = Pegasus::new();
        let root = solver.solve(&mut |x| x * x - 2.0, 0.0, 2.0).unwrap();
        assert_abs_diff_eq!(root.value, 2.0_f64.sqrt(), epsilon = 1e-8);
        assert!(root.iterations < solver.settings().max_iterations);
    }

    #[test]
    fn test_pegasus_exact_endpoint() {
        let solver = Pegasus::new();
        let root = solver.solve(&mut |x| x - 1.0, 1.0, 3.0).unwrap();
        assert_eq!(root.value, 1.0);
        assert_eq!(root.iterations, 0);
    }

    #[test]
    fn test_pegasus_transcendental() {
        // cos(x) = x has its root near 0.7390851332
        let solver = Pegasus::new();
        let root = solver.solve(&mut |x| x.cos() - x, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(root.value, 0.739_085_133_2, epsilon = 1e-8);
    }

    #[test]
    fn test_pegasus_expands_unbracketed_guesses() {
        let solver = Pegasus::new();
        let root = solver.solve(&mut |x| x - 25.0, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(root.value, 25.0, epsilon = 1e-8);
    }

    #[test]
    fn test_pegasus_iteration_budget() {
        let settings = RootFinderSettings {
            max_iterations: 2,
            tol_f: 1e-15,
            tol_x: 1e-15,
            ..RootFinderSettings::default()
        };
        let solver = Pegasus::with_settings(settings);
        let err = solver.solve(&mut |x| x.powi(9) - 0.5, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, RootFinderError::NonConvergence { iterations: 2, .. }));
    }

    #[test]
    fn test_pegasus_counts_evaluations() {
        let solver = Pegasus::new();
        let mut calls = 0usize;
        let root = solver
            .solve(
                &mut |x| {
                    calls += 1;
                    x.exp() - 3.0
                },
                0.0,
                2.0,
            )
            .unwrap();
        assert_abs_diff_eq!(root.value, 3.0_f64.ln(), epsilon = 1e-8);
        assert!(calls <= 2 + root.iterations);
    }

    #[test]
    fn test_pegasus_rejects_jump_discontinuity() {
        // Sign change at x = 1 without a zero
        let solver = Pegasus::new();
        let err = solver
            .solve(&mut |x| if x < 1.0 { -1.0 } else { 1.0 }, 0.0, 2.0)
            .unwrap_err();
        match err {
            RootFinderError::NonConvergence { residual, .. } => assert_eq!(residual, 1.0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pegasus_reports_unscaled_residual() {
        let solver = Pegasus::new();
        let f = |x: f64| x.powi(3) - 0.3;
        let root = solver.solve(&mut |x| f(x), 0.0, 1.0).unwrap();
        assert_eq!(root.residual, f(root.value));
        assert!(root.residual.abs() < solver.settings().tol_f);
    }
}
