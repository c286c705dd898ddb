//! Root finder evaluation tests
//!
//! Both finders are run on residuals with known analytic roots:
//! - the implicit Euler residual of a linear store, root S0 / (1 + k dt)
//! - a cubic with a single real root
//! - a steep exponential that punishes plain secant steps
//!
//! The failure paths use residuals without a root inside the bracket
//! (a jump discontinuity) and exhausted iteration budgets.

use approx::assert_abs_diff_eq;
use superflex_core::root_finder::{Newton, Pegasus, RootFinder};
use superflex_core::RootFinderError;
use superflex_types::RootFinderSettings;

fn finders() -> Vec<Box<dyn RootFinder>> {
    vec![Box::new(Pegasus::new()), Box::new(Newton::new())]
}

#[test]
fn test_linear_store_residual() {
    let (s0, k, dt) = (10.0, 0.3, 2.0);
    for finder in finders() {
        let root = finder
            .solve(&mut |s| s - s0 + dt * k * s, 0.0, s0)
            .unwrap();
        assert_abs_diff_eq!(root.value, s0 / (1.0 + k * dt), epsilon = 1e-8);
        assert!(root.iterations <= finder.settings().max_iterations);
    }
}

#[test]
fn test_cubic() {
    // x^3 - 2x - 5 has its real root at 2.0945514815423265
    for finder in finders() {
        let root = finder.solve(&mut |x| x * x * x - 2.0 * x - 5.0, 2.0, 3.0).unwrap();
        assert_abs_diff_eq!(root.value, 2.094_551_481_542_326_5, epsilon = 1e-8);
    }
}

#[test]
fn test_steep_exponential() {
    for finder in finders() {
        let root = finder.solve(&mut |x| (10.0 * x).exp() - 2.0, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(root.value, 2.0_f64.ln() / 10.0, epsilon = 1e-8);
    }
}

#[test]
fn test_bracket_found_by_expansion() {
    // Root at 5, guesses both below it
    let root = Pegasus::new().solve(&mut |x| x - 5.0, 0.0, 1.0).unwrap();
    assert_abs_diff_eq!(root.value, 5.0, epsilon = 1e-8);
}

#[test]
fn test_no_root_reports_failure() {
    let settings = RootFinderSettings {
        max_expansions: 10,
        ..Default::default()
    };
    for finder in [
        Box::new(Pegasus::with_settings(settings)) as Box<dyn RootFinder>,
        Box::new(Newton::with_settings(settings)),
    ] {
        let err = finder.solve(&mut |x| x * x + 1.0, -1.0, 1.0).unwrap_err();
        assert!(matches!(err, RootFinderError::NoBracket { expansions: 10 }));
    }
}

#[test]
fn test_nan_residual_reports_failure() {
    let err = Pegasus::new()
        .solve(&mut |x| if x > 0.5 { f64::NAN } else { x - 1.0 }, 0.0, 2.0)
        .unwrap_err();
    assert!(matches!(
        err,
        RootFinderError::NonFinite { .. } | RootFinderError::NoBracket { .. }
    ));
}

#[test]
fn test_jump_discontinuity_is_not_a_root() {
    // A threshold flux law: the residual changes sign at x = 1 but never vanishes
    for finder in finders() {
        let err = finder
            .solve(&mut |x| if x < 1.0 { -1.0 } else { 1.0 }, 0.0, 2.0)
            .unwrap_err();
        assert!(
            matches!(err, RootFinderError::NonConvergence { residual, .. } if residual >= 1.0),
            "{err:?}"
        );
    }
}

#[test]
fn test_offset_jump_is_not_a_root() {
    // Steep but discontinuous: f jumps from -0.5 to +0.25 at x = 0.3
    for finder in finders() {
        let err = finder
            .solve(
                &mut |x| if x < 0.3 { x - 0.8 } else { x - 0.05 },
                0.0,
                1.0,
            )
            .unwrap_err();
        assert!(matches!(err, RootFinderError::NonConvergence { .. }), "{err:?}");
    }
}

#[test]
fn test_newton_iteration_limit() {
    let settings = RootFinderSettings {
        max_iterations: 1,
        tol_f: 1e-14,
        tol_x: 1e-14,
        ..Default::default()
    };
    let err = Newton::with_settings(settings)
        .solve(&mut |x| x.powi(5) - 0.7, 0.0, 1.0)
        .unwrap_err();
    assert!(matches!(
        err,
        RootFinderError::NonConvergence { iterations: 1, .. }
    ));
}

#[test]
fn test_reported_residual_matches_value() {
    let residual = |x: f64| (3.0 * x).exp() - 4.0 * x - 2.0;
    for finder in finders() {
        let root = finder.solve(&mut |x| residual(x), 0.0, 2.0).unwrap();
        assert_eq!(root.residual, residual(root.value));
        assert!(root.residual.abs() < finder.settings().tol_f);
    }
}
