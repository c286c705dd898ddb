//! Safeguarded Newton-Raphson method

use superflex_types::RootFinderSettings;

use super::{expand_bracket, Root, RootFinder};
use crate::error::RootFinderError;

/// Newton-Raphson with a finite-difference derivative
///
/// The derivative is estimated with a forward difference of relative step
/// `perturbation`. Every iterate is kept inside a sign-change bracket: when
/// the Newton step leaves the bracket or the slope vanishes, the iterate
/// falls back to the bracket midpoint.
///
/// # Characteristics
/// - Quadratic convergence near a simple root
/// - Two residual evaluations per iteration
/// - Never leaves the bracket
#[derive(Debug, Clone, Default)]
pub struct Newton {
    settings: RootFinderSettings,
}

impl Newton {
    /// Create a Newton solver with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Newton solver with custom settings
    pub fn with_settings(settings: RootFinderSettings) -> Self {
        Self { settings }
    }
}

impl RootFinder for Newton {
    fn settings(&self) -> &RootFinderSettings {
        &self.settings
    }

    fn solve(&self, f: &mut dyn FnMut(f64) -> f64, a: f64, b: f64) -> Result<Root, RootFinderError> {
        let tol_f = self.settings.tol_f;
        let tol_x = self.settings.tol_x;
        let bracket = expand_bracket(f, a, b, self.settings.max_expansions)?;
        let (mut lo, mut f_lo, mut hi) = (bracket.a, bracket.fa, bracket.b);

        if f_lo.abs() < tol_f {
            return Ok(Root {
                value: lo,
                residual: f_lo,
                iterations: 0,
            });
        }
        if bracket.fb.abs() < tol_f {
            return Ok(Root {
                value: hi,
                residual: bracket.fb,
                iterations: 0,
            });
        }

        let mut x = 0.5 * (lo + hi);
        let mut fx = f64::INFINITY;

        for iteration in 1..=self.settings.max_iterations {
            fx = f(x);
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

            if fx * f_lo < 0.0 {
                hi = x;
            } else {
                lo = x;
                f_lo = fx;
            }

            let h = self.settings.perturbation * x.abs().max(1.0);
            let slope = (f(x + h) - fx) / h;
            let newton = x - fx / slope;
            let next = if slope.is_finite() && slope != 0.0 && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };

            if (next - x).abs() < tol_x || (hi - lo).abs() < tol_x {
                let residual = f(next);
                if residual.abs() < tol_f {
                    return Ok(Root {
                        value: next,
                        residual,
                        iterations: iteration,
                    });
                }
                // A collapsed bracket around a jump is not a root
                if (hi - lo).abs() < tol_x {
                    return Err(RootFinderError::NonConvergence {
                        iterations: iteration,
                        residual: residual.abs(),
                    });
                }
            }
            x = next;
        }

        Err(RootFinderError::NonConvergence {
            iterations: self.settings.max_iterations,
            residual: fx.abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_newton_sqrt2() {
        let solver = Newton::new();
        let root = solver.solve(&mut |x| x * x - 2.0, 0.0, 2.0).unwrap();
        assert_abs_diff_eq!(root.value, 2.0_f64.sqrt(), epsilon = 1e-7);
    }

    #[test]
    fn test_newton_flat_start_falls_back_to_bisection() {
        // Zero slope at the midpoint of [-1, 1]
        let solver = Newton::new();
        let root = solver.solve(&mut |x| x * x * x - 0.125, -1.0, 1.0).unwrap();
        assert_abs_diff_eq!(root.value, 0.5, epsilon = 1e-7);
    }

    #[test]
    fn test_newton_stays_in_bracket() {
        // atan overshoots wildly under plain Newton from far away
        let solver = Newton::new();
        let root = solver.solve(&mut |x| x.atan(), -20.0, 30.0).unwrap();
        assert_abs_diff_eq!(root.value, 0.0, epsilon = 1e-7);
    }
    #[test]
    fn test_newton_rejects_jump_discontinuity() {
        let solver = Newton::new();
        let err = solver
            .solve(&mut |x| if x < 1.0 { -1.0 } else { 1.0 }, 0.0, 2.0)
            .unwrap_err();
        match err {
            RootFinderError::NonConvergence { residual, .. } => assert_eq!(residual, 1.0),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
