//! Clipped states are reported, never silently swallowed

use std::sync::Arc;

use superflex::prelude::*;

#[test]
fn test_clipped_state_is_recorded() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Forward Euler with k dt > 1 overshoots below zero
    let store = ReservoirElement::new(
        "fr",
        PowerReservoir,
        Parameters::new().with("k", 1.5).with("alpha", 1.0),
        Some(10.0),
        Arc::new(ExplicitEuler::new()),
    )
    .unwrap();
    let mut unit = Unit::new("u", vec![vec![store.into()]]).unwrap();
    unit.set_input(vec![vec![0.0, 0.0]]).unwrap();
    unit.get_output(true).unwrap();

    let violations = unit.bounds_violations();
    assert_eq!(violations.len(), 1);
    let (element, violation) = violations[0];
    assert_eq!(element, "fr");
    assert_eq!(violation.timestep, 0);
    assert_eq!(violation.clipped, 0.0);
    assert!(violation.value < 0.0);

    let recorded = unit.get_internal("fr", &Attribute::BoundsViolations).unwrap();
    assert_eq!(recorded.as_violations().unwrap().len(), 1);
}

#[test]
fn test_implicit_step_within_bounds_is_silent() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = ReservoirElement::new(
        "fr",
        PowerReservoir,
        Parameters::new().with("k", 1.5).with("alpha", 1.0),
        Some(10.0),
        Arc::new(ImplicitEuler::default()),
    )
    .unwrap();
    let mut unit = Unit::new("u", vec![vec![store.into()]]).unwrap();
    unit.set_input(vec![vec![0.0; 10]]).unwrap();
    unit.get_output(true).unwrap();
    assert!(unit.bounds_violations().is_empty());
}
